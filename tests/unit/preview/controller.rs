use super::*;

fn raw_pcm(secs: f64) -> AudioPayload {
    let n = (secs * 24_000.0) as usize;
    AudioPayload::RawPcm((0..n).flat_map(|i| ((i % 7) as i16 * 300).to_le_bytes()).collect())
}

fn ready(secs: f64, images: usize) -> PreviewController<HeadlessOutput> {
    let mut c = PreviewController::new(HeadlessOutput::new(48_000).unwrap(), "Kun", images);
    c.load(
        &raw_pcm(secs),
        &["Bu ajoyib kun edi", "Hammaga yoqdi"],
        &TimingOpts::default(),
    )
    .unwrap();
    c
}

#[test]
fn starts_loading_and_becomes_idle_after_decode() {
    let mut c = PreviewController::new(HeadlessOutput::new(48_000).unwrap(), "t", 2);
    assert_eq!(c.state(), PreviewState::Loading);
    assert!(c.play().is_err());
    c.load(&raw_pcm(1.0), &["a b"], &TimingOpts::default())
        .unwrap();
    assert_eq!(c.state(), PreviewState::Idle);
    assert!((c.duration() - 1.0).abs() < 1e-9);
}

#[test]
fn decode_failure_degrades_to_title_only() {
    let mut c = PreviewController::new(HeadlessOutput::new(48_000).unwrap(), "Title", 3);
    let err = c
        .load(
            &AudioPayload::Container(b"junk".to_vec()),
            &["a"],
            &TimingOpts::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ReelError::Decode(_)));
    assert_eq!(c.state(), PreviewState::Unavailable);
    assert!(c.last_error().is_some());
    let f = c.tick();
    assert_eq!(f.state, PreviewState::Unavailable);
    assert_eq!(f.title.as_deref(), Some("Title"));
    assert!(c.play().is_err());
}

#[test]
fn elapsed_follows_the_audio_clock() {
    let mut c = ready(6.0, 4);
    c.output_mut().pump(0.25).unwrap();
    c.play().unwrap();
    let f = c.tick();
    assert_eq!(f.elapsed, 0.0);
    assert_eq!(f.image_index, Some(0));

    c.output_mut().pump(1.6).unwrap();
    let f = c.tick();
    assert!((f.elapsed - 1.6).abs() < 1e-6);
    assert_eq!(f.image_index, Some(1));
    assert_eq!(f.previous_image, Some(0));
    assert!((f.crossfade - 0.1 / CROSSFADE_SECS).abs() < 1e-6);
    assert_eq!(f.chunk_index, Some(0));
    assert!(f.title.is_none());
    assert!(f.zoom > 1.0 && f.zoom < PREVIEW_MAX_ZOOM);
}

#[test]
fn word_states_track_elapsed() {
    let mut c = ready(6.0, 1);
    c.play().unwrap();
    c.output_mut().pump(0.7).unwrap();
    let f = c.tick();
    let states: Vec<WordState> = f.words.iter().map(|w| w.state).collect();
    assert_eq!(
        states,
        vec![
            WordState::Spoken,
            WordState::Current,
            WordState::Upcoming,
            WordState::Upcoming
        ]
    );
    assert_eq!(f.words[0].text, "Bu");
}

#[test]
fn natural_end_returns_to_idle_and_resets() {
    let mut c = ready(0.5, 2);
    c.play().unwrap();
    c.output_mut().pump(0.6).unwrap();
    let f = c.tick();
    assert_eq!(f.state, PreviewState::Idle);
    assert_eq!(f.elapsed, 0.0);
    assert_eq!(f.image_index, Some(0));
    assert!(c.output().has_ended());
}

#[test]
fn pause_resets_and_replay_restarts_from_zero() {
    let mut c = ready(6.0, 2);
    c.play().unwrap();
    c.output_mut().pump(2.0).unwrap();
    c.toggle().unwrap();
    assert_eq!(c.state(), PreviewState::Idle);
    assert_eq!(c.tick().elapsed, 0.0);

    c.toggle().unwrap();
    assert_eq!(c.state(), PreviewState::Playing);
    c.output_mut().pump(0.1).unwrap();
    assert!((c.tick().elapsed - 0.1).abs() < 1e-6);
}

#[test]
fn replay_never_overlaps_voices() {
    let mut c = ready(6.0, 1);
    c.play().unwrap();
    c.output_mut().pump(0.1).unwrap();
    c.play().unwrap();
    let single = c.output_mut().pump(0.1).unwrap();
    let peak = single.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    // A single full-gain voice of this payload peaks at 1800/32768.
    assert!(peak <= 1800.0 / 32768.0 + 1e-4, "peak {peak}");
}

#[test]
fn mute_silences_the_current_voice() {
    let mut c = ready(6.0, 1);
    c.play().unwrap();
    c.toggle_mute().unwrap();
    assert!(c.is_muted());
    let out = c.output_mut().pump(0.2).unwrap();
    assert!(out.iter().all(|s| *s == 0.0));
    assert!(c.tick().muted);
}

#[test]
fn teardown_closes_the_engine() {
    let mut c = ready(1.0, 1);
    c.play().unwrap();
    c.teardown();
    assert_eq!(c.state(), PreviewState::Idle);
    assert_eq!(
        c.output().engine().state(),
        crate::audio::graph::EngineState::Closed
    );
    c.teardown();
}
