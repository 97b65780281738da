//! JSON project manifest describing one reel.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    assets::images::ImageSource,
    audio::decode::AudioPayload,
    export::pipeline::{ExportRequest, MusicTrack},
    foundation::{
        core::{Fps, Quality},
        error::{ReelError, ReelResult},
    },
    render::subtitle::SubtitleStyle,
    timing::estimate::{TimingOpts, script_lines_from_text},
};

fn default_music_volume() -> u8 {
    20
}

fn default_words_per_chunk() -> usize {
    TimingOpts::default().max_words_per_chunk
}

fn default_fps() -> u32 {
    30
}

/// A reel as written by hand or by the generation step.
///
/// References are data URIs, `http(s)` URLs (images only) or file paths. Relative paths resolve
/// against the manifest's directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReelProject {
    /// Title or topic.
    pub title: String,
    /// Script lines.
    #[serde(default)]
    pub script: Vec<String>,
    /// Script as free text, split on newlines. Used when `script` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
    /// Narration reference: data URI, file path, or inline base64 raw PCM (24 kHz mono s16le).
    pub narration: String,
    /// Image references, in display order.
    pub images: Vec<String>,
    /// Optional music reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    /// Music volume, 0..=100.
    #[serde(default = "default_music_volume")]
    pub music_volume: u8,
    /// Output preset.
    #[serde(default)]
    pub quality: Quality,
    /// Subtitle look.
    #[serde(default)]
    pub style: SubtitleStyle,
    /// Font file used to draw subtitles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
    /// Maximum words per subtitle chunk.
    #[serde(default = "default_words_per_chunk")]
    pub words_per_chunk: usize,
    /// Capture frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl ReelProject {
    /// Parse a manifest from a JSON reader. Relative paths resolve against `base_dir`.
    pub fn from_reader<R: std::io::Read>(r: R, base_dir: impl Into<PathBuf>) -> ReelResult<Self> {
        let mut project: Self = serde_json::from_reader(r)
            .map_err(|e| ReelError::serde(format!("parse reel project JSON: {e}")))?;
        project.base_dir = base_dir.into();
        Ok(project)
    }

    /// Parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ReelError::validation(format!("open reel project '{}': {e}", path.display()))
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_reader(BufReader::new(f), base_dir)
    }

    /// Directory relative references resolve against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Check every field that would otherwise fail deep inside an export.
    pub fn validate(&self) -> ReelResult<()> {
        if self.script_lines().is_empty() {
            return Err(ReelError::validation("script has no non-blank lines"));
        }
        if self.narration.trim().is_empty() {
            return Err(ReelError::validation("narration reference is empty"));
        }
        if self.images.is_empty() {
            return Err(ReelError::validation("at least one image is required"));
        }
        if self.music_volume > 100 {
            return Err(ReelError::validation(format!(
                "music_volume must be 0..=100, got {}",
                self.music_volume
            )));
        }
        if self.words_per_chunk == 0 {
            return Err(ReelError::validation("words_per_chunk must be > 0"));
        }
        if !self.style.font_size.is_finite() {
            return Err(ReelError::validation("style.font_size must be finite"));
        }
        Fps::new(self.fps, 1)?;
        Ok(())
    }

    /// Script lines, blank lines dropped.
    pub fn script_lines(&self) -> Vec<String> {
        if self.script.is_empty() {
            return self
                .script_text
                .as_deref()
                .map(script_lines_from_text)
                .unwrap_or_default();
        }
        self.script
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Resolve a path reference against the manifest directory.
    pub fn resolve(&self, reference: &Path) -> PathBuf {
        if reference.is_absolute() {
            reference.to_path_buf()
        } else {
            self.base_dir.join(reference)
        }
    }

    /// Font file, resolved.
    pub fn font_path(&self) -> Option<PathBuf> {
        self.font.as_deref().map(|p| self.resolve(p))
    }

    /// Image sources, resolved.
    pub fn image_sources(&self) -> Vec<ImageSource> {
        self.images
            .iter()
            .map(|r| match ImageSource::from_reference(r) {
                ImageSource::Path(p) => ImageSource::Path(self.resolve(&p)),
                other => other,
            })
            .collect()
    }

    /// Read the narration payload.
    pub fn narration_payload(&self) -> ReelResult<AudioPayload> {
        AudioPayload::from_reference(&self.narration, &self.base_dir)
            .map_err(|e| ReelError::audio_unavailable(format!("narration: {e}")))
    }

    /// Read the music payload. A music bed that cannot be read is dropped with a warning.
    pub fn music_track(&self) -> Option<MusicTrack> {
        let reference = self.music.as_deref()?;
        match AudioPayload::from_reference(reference, &self.base_dir) {
            Ok(payload) => Some(MusicTrack {
                payload,
                volume: self.music_volume.min(100),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "background music could not be read; continuing without it");
                None
            }
        }
    }

    /// Timing knobs.
    pub fn timing_opts(&self) -> TimingOpts {
        TimingOpts {
            max_words_per_chunk: self.words_per_chunk,
        }
    }

    /// Capture rate.
    pub fn fps(&self) -> ReelResult<Fps> {
        Fps::new(self.fps, 1)
    }

    /// Build the export request for this manifest at its quality preset.
    pub fn to_export_request(&self) -> ReelResult<ExportRequest> {
        self.validate()?;
        Ok(ExportRequest {
            title: self.title.clone(),
            script: self.script_lines(),
            narration: self.narration_payload()?,
            images: self.image_sources(),
            music: self.music_track(),
            canvas: self.quality.canvas(),
            style: self.style.clone(),
            timing: self.timing_opts(),
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/project.rs"]
mod tests;
