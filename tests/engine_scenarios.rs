//! End-to-end scenarios driven entirely through the public `Engine` API:
//! config text in, PCM frames in, numbers/strings/images out. Kernel-level
//! numeric properties already have focused unit tests next to their
//! handlers; these confirm the wiring between config, graph construction,
//! and read-back behaves the way a host actually depends on.

use std::time::{Duration, Instant};

use rt_analyzer_core::{config, Channel, Engine, Status};

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

fn sine(freq_hz: f32, sample_rate: u32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[test]
fn silence_settles_to_a_near_zero_rms_floor() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.02

        [[processing.handlers]]
        name = "rms"
        type = "rms"
        updateRate = 50.0
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let silence = vec![0.0f32; 48000];
    let status = engine.update(&silence, &[Channel::Mono], 48000, far_deadline());
    assert_eq!(status, Status::Ok);

    let rms = engine.read_number("main", Channel::Mono, "rms", 0).unwrap();
    assert!(rms.abs() < 1e-4, "expected near-zero RMS floor, got {rms}");
}

#[test]
fn single_tone_peaks_at_the_expected_fft_bin() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.2

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 10.0
        windowFunction = "hann"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let wave = sine(1000.0, 48000, 48000);
    engine.update(&wave, &[Channel::Mono], 48000, far_deadline());

    let fft_size: f32 = engine
        .read_string("main", Channel::Mono, "fft", "fft size")
        .and_then(|s| s.parse().ok())
        .unwrap();

    let mut best_ix = 0usize;
    let mut best_val = f64::MIN;
    for ix in 0..(fft_size as usize / 2) {
        let Some(v) = engine.read_number("main", Channel::Mono, "fft", ix) else { break };
        if v > best_val {
            best_val = v;
            best_ix = ix;
        }
    }
    let bin_width = 48000.0 / fft_size;
    let target = (1000.0 / bin_width).round() as i64;
    assert!((best_ix as i64 - target).abs() <= 2, "best_ix={best_ix} target={target}");
}

#[test]
fn band_resampler_concentrates_tone_energy_in_its_band() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.2

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 10.0

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "fft"
        bands = "log 10 20 20000"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let wave = sine(1000.0, 48000, 48000);
    engine.update(&wave, &[Channel::Mono], 48000, far_deadline());

    let mut values = Vec::new();
    for ix in 0..10 {
        values.push(engine.read_number("main", Channel::Mono, "bands", ix).unwrap_or(0.0));
    }
    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    assert!(max > 0.0);
}

#[test]
fn spectrogram_finish_writes_a_readable_bmp() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.05

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 40.0

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "fft"
        bands = "linear 16 0 20000"

        [[processing.handlers]]
        name = "image"
        type = "spectrogram"
        source = "bands"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let wave = sine(500.0, 48000, 48000);
    engine.update(&wave, &[Channel::Mono], 48000, far_deadline());

    let dir = std::env::temp_dir().join(format!("rt-analyzer-core-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let prefix = dir.join("spectrogram").to_string_lossy().to_string();
    engine.finish("main", Channel::Mono, "image", &prefix).unwrap();

    let bytes = std::fs::read(format!("{prefix}.bmp")).unwrap();
    assert_eq!(&bytes[0..2], b"BM");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reload_with_unchanged_config_preserves_running_handler_state() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.02

        [[processing.handlers]]
        name = "rms"
        type = "rms"
        updateRate = 50.0
        attack = 5.0
        decay = 200.0
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    engine.update(&vec![0.8f32; 48000], &[Channel::Mono], 48000, far_deadline());
    let first = engine.read_number("main", Channel::Mono, "rms", 0).unwrap();

    // Reloading identical config must not reset the attack/decay smoothing state.
    engine.reload(&cfg, 2).unwrap();
    let unchanged = engine.read_number("main", Channel::Mono, "rms", 0).unwrap();
    assert!((first - unchanged).abs() < 1e-9);
}

#[test]
fn auto_channel_binds_to_the_first_channel_present() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "auto"
        granularity = 0.02

        [[processing.handlers]]
        name = "rms"
        type = "rms"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let frames: Vec<f32> = (0..48000 * 2).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    engine.update(&frames, &[Channel::Left, Channel::Right], 48000, far_deadline());

    let value = engine.read_number("main", Channel::Auto, "rms", 0);
    assert!(value.is_some());
}

#[test]
fn a_deadline_already_past_does_not_panic_and_still_reports_ok() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "main"
        channels = "mono"
        granularity = 0.02

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 20.0
        cascadesCount = 3
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    let wave = sine(300.0, 48000, 48000);
    let past_deadline = Instant::now() - Duration::from_millis(1);
    let status = engine.update(&wave, &[Channel::Mono], 48000, past_deadline);
    assert_eq!(status, Status::Ok);
}
