//! Handler-graph construction rules exercised through `Engine::reload`: a
//! structurally broken group is rejected, a handler-level problem only
//! drops that handler, and one bad group never takes down the others.

use std::time::{Duration, Instant};

use rt_analyzer_core::{config, Channel, Engine, Status};

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[test]
fn one_broken_group_does_not_disable_the_others() {
    let cfg = config::parse(
        r#"
        target_rate = 48000

        [[processing]]
        name = "broken"
        channels = ""

        [[processing]]
        name = "healthy"
        channels = "mono"

        [[processing.handlers]]
        name = "rms"
        type = "rms"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    let report = engine.reload(&cfg, 1).unwrap();
    assert_eq!(report.groups_loaded, 1);
    assert_eq!(report.groups_rejected, 1);

    let status = engine.update(&vec![0.3f32; 48000], &[Channel::Mono], 48000, far_deadline());
    assert_eq!(status, Status::Ok);
    assert!(engine.read_number("healthy", Channel::Mono, "rms", 0).is_some());
    assert!(engine.read_number("broken", Channel::Mono, "rms", 0).is_none());
}

#[test]
fn an_unknown_source_drops_only_the_dependent_handler() {
    let cfg = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "rms"
        type = "rms"

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "does_not_exist"
        bands = "linear 4 0 20000"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    engine.update(&vec![0.1f32; 48000], &[Channel::Mono], 48000, far_deadline());

    assert!(engine.read_number("main", Channel::Mono, "rms", 0).is_some());
    assert!(engine.read_number("main", Channel::Mono, "bands", 0).is_none());
}

#[test]
fn a_handler_sourcing_from_the_wrong_type_is_dropped() {
    let cfg = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "rms"
        type = "rms"

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "rms"
        bands = "linear 4 0 20000"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    engine.update(&vec![0.1f32; 48000], &[Channel::Mono], 48000, far_deadline());

    assert!(engine.read_number("main", Channel::Mono, "rms", 0).is_some());
    assert!(engine.read_number("main", Channel::Mono, "bands", 0).is_none());
}

#[test]
fn duplicate_handler_names_reject_the_whole_group() {
    let cfg = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "dup"
        type = "rms"

        [[processing.handlers]]
        name = "dup"
        type = "peak"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    let report = engine.reload(&cfg, 1).unwrap();
    assert_eq!(report.groups_loaded, 0);
    assert_eq!(report.groups_rejected, 1);
}

#[test]
fn reloading_away_a_handlers_source_drops_it_cleanly_on_the_next_reload() {
    let with_fft = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "fft"
        type = "fft"
        binWidth = 40.0

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "fft"
        bands = "linear 4 0 20000"
        "#,
    )
    .unwrap();
    let without_fft = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "bands"
        type = "BandResampler"
        source = "fft"
        bands = "linear 4 0 20000"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&with_fft, 1).unwrap();
    engine.update(&vec![0.1f32; 48000], &[Channel::Mono], 48000, far_deadline());
    assert!(engine.read_number("main", Channel::Mono, "bands", 0).is_some());

    engine.reload(&without_fft, 2).unwrap();
    engine.update(&vec![0.1f32; 48000], &[Channel::Mono], 48000, far_deadline());
    assert!(engine.read_number("main", Channel::Mono, "bands", 0).is_none());
}

#[test]
fn command_stop_then_resume_round_trips() {
    let cfg = config::parse(
        r#"
        [[processing]]
        name = "main"
        channels = "mono"

        [[processing.handlers]]
        name = "rms"
        type = "rms"
        "#,
    )
    .unwrap();

    let mut engine = Engine::new();
    engine.reload(&cfg, 1).unwrap();
    engine.command("stop");
    assert_eq!(engine.update(&vec![1.0f32; 48000], &[Channel::Mono], 48000, far_deadline()), Status::NoData);

    engine.command("resume");
    assert_eq!(engine.update(&vec![1.0f32; 48000], &[Channel::Mono], 48000, far_deadline()), Status::Ok);
}
