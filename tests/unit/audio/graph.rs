use super::*;

fn constant(value: f32, frames: usize, rate: u32) -> Arc<DecodedAudio> {
    Arc::new(DecodedAudio {
        channels: vec![vec![value; frames]],
        sample_rate: rate,
        duration: frames as f64 / f64::from(rate),
    })
}

#[test]
fn gain_rules_follow_music_volume() {
    assert_eq!(narration_gain(None), 1.0);
    assert!((narration_gain(Some(20)) - 0.9).abs() < 1e-6);
    assert_eq!(narration_gain(Some(100)), 0.5);
    assert_eq!(music_gain(20), 0.2);
    assert_eq!(music_gain(250), 1.0);
}

#[test]
fn clock_advances_only_with_rendered_frames() {
    let mut engine = MixEngine::new(1000).unwrap();
    assert_eq!(engine.current_time(), 0.0);
    let out = engine.render(250).unwrap();
    assert_eq!(out.len(), 500);
    assert!((engine.current_time() - 0.25).abs() < 1e-12);

    assert!(engine.render(0).unwrap().is_empty());
    assert!((engine.current_time() - 0.25).abs() < 1e-12);
    engine.render_until(1.0).unwrap();
    assert_eq!(engine.frames_rendered(), 1000);
}

#[test]
fn sources_sum_on_the_bus_with_gain() {
    let mut engine = MixEngine::new(1000).unwrap();
    let a = engine
        .add_source(constant(0.5, 100, 1000), SourceOpts { gain: 0.9, looped: false })
        .unwrap();
    let b = engine
        .add_source(constant(0.25, 100, 1000), SourceOpts { gain: 0.2, looped: true })
        .unwrap();
    engine.start_source(a).unwrap();
    engine.start_source(b).unwrap();
    let out = engine.render(10).unwrap();
    let expected = 0.5 * 0.9 + 0.25 * 0.2;
    assert!(out.iter().all(|s| (s - expected).abs() < 1e-6));
}

#[test]
fn non_looped_source_ends_and_looped_keeps_going() {
    let mut engine = MixEngine::new(1000).unwrap();
    let narration = engine
        .add_source(constant(0.5, 100, 1000), SourceOpts::default())
        .unwrap();
    let music = engine
        .add_source(constant(0.1, 30, 1000), SourceOpts { gain: 1.0, looped: true })
        .unwrap();
    engine.start_source(narration).unwrap();
    engine.start_source(music).unwrap();

    engine.render(99).unwrap();
    assert!(!engine.has_ended(narration));
    engine.render(1).unwrap();
    assert!(engine.has_ended(narration));

    let tail = engine.render(50).unwrap();
    assert!(!engine.has_ended(music));
    assert!(tail.iter().all(|s| (s - 0.1).abs() < 1e-6));
}

#[test]
fn sources_start_relative_to_clock() {
    let mut engine = MixEngine::new(1000).unwrap();
    engine.render(500).unwrap();
    let id = engine
        .add_source(constant(0.5, 1000, 1000), SourceOpts::default())
        .unwrap();
    engine.start_source(id).unwrap();
    engine.render(999).unwrap();
    assert!(!engine.has_ended(id));
    engine.render(1).unwrap();
    assert!(engine.has_ended(id));
}

#[test]
fn double_start_is_graph_error_and_stop_is_idempotent() {
    let mut engine = MixEngine::new(1000).unwrap();
    let id = engine
        .add_source(constant(0.5, 10, 1000), SourceOpts::default())
        .unwrap();
    engine.start_source(id).unwrap();
    assert!(matches!(engine.start_source(id), Err(ReelError::Graph(_))));
    engine.stop_source(id);
    engine.stop_source(id);
    engine.disconnect(id);
    assert!(engine.has_ended(id));
    assert!(engine.render(5).unwrap().iter().all(|s| *s == 0.0));
}

#[test]
fn disconnected_source_is_silent_and_muted_gain_is_zero() {
    let mut engine = MixEngine::new(1000).unwrap();
    let id = engine
        .add_source(constant(0.5, 100, 1000), SourceOpts::default())
        .unwrap();
    engine.start_source(id).unwrap();
    engine.set_gain(id, 0.0).unwrap();
    assert!(engine.render(5).unwrap().iter().all(|s| *s == 0.0));
    engine.set_gain(id, 1.0).unwrap();
    engine.disconnect(id);
    assert!(engine.render(5).unwrap().iter().all(|s| *s == 0.0));
}

#[test]
fn resamples_source_rate_to_engine_rate() {
    let mut engine = MixEngine::new(48_000).unwrap();
    let id = engine
        .add_source(constant(0.5, 24_000, 24_000), SourceOpts::default())
        .unwrap();
    engine.start_source(id).unwrap();
    engine.render_until(0.999).unwrap();
    assert!(!engine.has_ended(id));
    engine.render_until(1.0).unwrap();
    assert!(engine.has_ended(id));
}

#[test]
fn closed_engine_rejects_operations() {
    let mut engine = MixEngine::new(1000).unwrap();
    engine.close();
    engine.close();
    assert_eq!(engine.state(), EngineState::Closed);
    assert!(engine.render(1).is_err());
    assert!(
        engine
            .add_source(constant(0.5, 10, 1000), SourceOpts::default())
            .is_err()
    );
    assert!(MixEngine::new(0).is_err());
}
