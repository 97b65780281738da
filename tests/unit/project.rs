use super::*;
use crate::assets::color::ColorRgba8;

const MANIFEST: &str = r##"{
    "title": "Ajoyib kun",
    "script": ["Bu ajoyib kun edi", "  ", "Hammaga yoqdi"],
    "narration": "voice.pcm",
    "images": ["img/a.png", "https://example.com/b.jpg", "/abs/c.png"],
    "music": "bed.mp3",
    "quality": "720p",
    "style": { "active_color": "#00FF00", "font_size": 40 }
}"##;

fn project() -> ReelProject {
    ReelProject::from_reader(MANIFEST.as_bytes(), "/reels/one").unwrap()
}

#[test]
fn defaults_fill_missing_fields() {
    let p = project();
    assert_eq!(p.music_volume, 20);
    assert_eq!(p.words_per_chunk, 4);
    assert_eq!(p.fps, 30);
    assert_eq!(p.quality, Quality::Hd720);
    assert_eq!(p.style.font_family, "Arial, sans-serif");
    assert_eq!(p.style.font_size, 40.0);
    assert_eq!(p.style.active_color.to_string(), "#00FF00");
    p.validate().unwrap();
}

#[test]
fn blank_lines_are_dropped() {
    assert_eq!(
        project().script_lines(),
        vec!["Bu ajoyib kun edi".to_owned(), "Hammaga yoqdi".to_owned()]
    );
}

#[test]
fn script_text_is_used_when_lines_are_absent() {
    let p = ReelProject::from_reader(
        r#"{"title":"t","script_text":"one two\n\n three ","narration":"n.wav","images":["a.png"]}"#
            .as_bytes(),
        ".",
    )
    .unwrap();
    assert_eq!(p.script_lines(), vec!["one two".to_owned(), "three".to_owned()]);
}

#[test]
fn relative_references_resolve_against_manifest_dir() {
    let p = project();
    let sources = p.image_sources();
    assert_eq!(
        sources[0],
        ImageSource::Path(PathBuf::from("/reels/one/img/a.png"))
    );
    assert!(matches!(sources[1], ImageSource::Url(_)));
    assert_eq!(sources[2], ImageSource::Path(PathBuf::from("/abs/c.png")));
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ReelProject::from_reader(
        r#"{"title":"t","narration":"n","images":[],"colour":"red"}"#.as_bytes(),
        ".",
    )
    .unwrap_err();
    assert!(matches!(err, ReelError::Serde(_)));
}

#[test]
fn validation_catches_bad_values() {
    let mut p = project();
    p.images.clear();
    assert!(p.validate().is_err());

    let mut p = project();
    p.music_volume = 150;
    assert!(p.validate().is_err());

    let mut p = project();
    p.script = vec![" ".to_owned()];
    assert!(p.validate().is_err());
}

#[test]
fn unreadable_music_is_dropped_but_narration_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("voice.pcm"), [0u8, 1, 2, 3]).unwrap();
    let path = dir.path().join("reel.json");
    std::fs::write(&path, MANIFEST).unwrap();

    let p = ReelProject::from_path(&path).unwrap();
    assert_eq!(p.base_dir(), dir.path());
    assert!(p.music_track().is_none());
    assert_eq!(
        p.narration_payload().unwrap(),
        AudioPayload::RawPcm(vec![0, 1, 2, 3])
    );

    let mut p = p;
    p.narration = "missing.pcm".to_owned();
    assert!(matches!(
        p.narration_payload().unwrap_err(),
        ReelError::AudioUnavailable(_)
    ));
}

#[test]
fn camel_case_style_reaches_the_project() {
    let p = ReelProject::from_reader(
        r##"{"title":"t","narration":"n.wav","images":["a.png"],
            "style":{"fontFamily":"Impact","fontSize":48,"activeColor":"#FF0000","bgEnabled":false}}"##
            .as_bytes(),
        ".",
    )
    .unwrap();
    assert_eq!(p.style.font_family, "Impact");
    assert_eq!(p.style.font_size, 48.0);
    assert_eq!(p.style.active_color, ColorRgba8::rgb(255, 0, 0));
    assert!(!p.style.bg_enabled);

    let err = ReelProject::from_reader(
        r#"{"title":"t","narration":"n.wav","images":["a.png"],"style":{"fontsize":48}}"#.as_bytes(),
        ".",
    )
    .unwrap_err();
    assert!(matches!(err, ReelError::Serde(_)));
}

#[test]
fn inline_raw_pcm_narration_is_accepted() {
    let mut p = project();
    p.narration = "AAABAAIA".to_owned();
    assert_eq!(
        p.narration_payload().unwrap(),
        AudioPayload::RawPcm(vec![0, 0, 1, 0, 2, 0])
    );
}

#[test]
fn export_request_uses_quality_canvas() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("voice.pcm"), [0u8, 0]).unwrap();
    let mut p = ReelProject::from_reader(MANIFEST.as_bytes(), dir.path()).unwrap();
    p.music = None;
    let req = p.to_export_request().unwrap();
    assert_eq!((req.canvas.width, req.canvas.height), (720, 1280));
    assert_eq!(req.script.len(), 2);
    assert_eq!(req.images.len(), 3);
    assert!(req.music.is_none());
}
