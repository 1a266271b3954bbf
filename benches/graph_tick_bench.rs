use std::time::{Duration, Instant};

use rt_analyzer_core::{Channel, Engine};

fn main() {
    let cfg = rt_analyzer_core::config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "left,right"
        granularity = 0.02

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 20.0
        cascadesCount = 4

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "fft"
        bands = "log 40 20 20000"

        [[processing.handlers]]
        name = "spectrogram"
        type = "spectrogram"
        source = "bands"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();

    let sample_rate = 48000u32;
    let block_frames = 960usize; // 20 ms stereo block
    let frames: Vec<f32> = (0..block_frames * 2)
        .map(|i| (i as f32 * 0.01).sin())
        .collect();

    let iterations = 2000;
    let start = Instant::now();
    for _ in 0..iterations {
        let deadline = Instant::now() + Duration::from_millis(20);
        engine.update(&frames, &[Channel::Left, Channel::Right], sample_rate, deadline);
    }
    let elapsed = start.elapsed();

    println!(
        "Graph tick benchmark: {} ticks in {:.2?} ({:.0} ticks/s, {:.2}ms/tick)",
        iterations,
        elapsed,
        iterations as f64 / elapsed.as_secs_f64(),
        elapsed.as_secs_f64() * 1000.0 / iterations as f64
    );
}
