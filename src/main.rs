use std::time::{Duration, Instant};

use log::info;
use rt_analyzer_core::{config, Channel, Engine};

/// Demonstrates the engine end to end: load a config, synthesize a second
/// of test tone, drive it through `Engine::update`, and print back whatever
/// the configured handlers produced. The host ABI that would normally embed
/// this engine is out of scope here; this binary exists to exercise it.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cfg_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let cfg = match config::load(&cfg_path) {
        Ok(cfg) => {
            info!("loaded '{cfg_path}'");
            cfg
        }
        Err(err) => {
            log::warn!("could not load '{cfg_path}' ({err}), running with a built-in demo config");
            config::parse(DEMO_CONFIG)?
        }
    };

    let mut engine = Engine::new();
    let report = engine.reload(&cfg, 1)?;
    info!("reload: {} group(s) loaded, {} rejected", report.groups_loaded, report.groups_rejected);

    let sample_rate = 48000u32;
    let tone = synth_tone(440.0, sample_rate, sample_rate as usize);
    let deadline = Instant::now() + Duration::from_millis(50);
    let status = engine.update(&tone, &[Channel::Mono], sample_rate, deadline);
    info!("update status: {status:?}");

    for group in &cfg.processing {
        for handler in &group.handlers {
            let Some(channel) = rt_analyzer_core::ChannelSet::parse(&group.channels).and_then(|s| s.iter().next().copied())
            else {
                continue;
            };
            if let Some(value) = engine.read_number(&group.name, channel, &handler.name, 0) {
                println!("{}/{}/{} -> {value}", group.name, handler.name, channel.as_str());
            }
        }
    }

    Ok(())
}

fn synth_tone(freq_hz: f32, sample_rate: u32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

const DEMO_CONFIG: &str = r#"
target_rate = 48000

[[processing]]
name = "main"
channels = "mono"
granularity = 0.02

[[processing.handlers]]
name = "rms"
type = "rms"
updateRate = 60.0

[[processing.handlers]]
name = "fft"
type = "fft"
binWidth = 20.0
"#;
