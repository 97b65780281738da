use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ReelError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(ReelError::decode("x").to_string().contains("decode error:"));
    assert!(
        ReelError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn export_failures_are_distinguishable() {
    let no_image = ReelError::no_image("all 3 images failed").to_string();
    let recording = ReelError::recording("ffmpeg exited").to_string();
    let audio = ReelError::audio_unavailable("narration corrupt").to_string();

    assert!(no_image.starts_with("no image available:"));
    assert!(recording.starts_with("recording failed:"));
    assert!(audio.starts_with("audio unavailable:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ReelError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
