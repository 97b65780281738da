use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::backend::FrameRGBA;

/// Output container of a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// H.264 + AAC in MP4.
    Mp4,
    /// VP9 + Opus in WebM.
    WebM,
}

impl ContainerFormat {
    /// Default preference order: the widely compatible container first.
    pub const PREFERENCE: [ContainerFormat; 2] = [ContainerFormat::Mp4, ContainerFormat::WebM];

    /// MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Audio track layout handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

/// Configuration provided to a [`CaptureSink`] when recording starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Capture frame rate.
    pub fps: Fps,
    /// Chosen container.
    pub format: ContainerFormat,
    /// Mixed audio track, if any.
    pub audio: Option<AudioTrackConfig>,
}

/// Finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMedia {
    /// Container bytes.
    pub bytes: Vec<u8>,
    /// Container the bytes are in.
    pub format: ContainerFormat,
}

/// A recorder that combines captured frames and mixed audio into one container.
///
/// Ordering contract: `push_frame` is called with strictly increasing [`FrameIndex`] between
/// `begin` and `end`. Audio is pushed as interleaved `f32` in the layout given by
/// [`SinkConfig::audio`].
pub trait CaptureSink: Send {
    /// Whether this host can record `format`. Queried each time a capture is set up.
    fn is_type_supported(&self, format: ContainerFormat) -> bool;
    /// Start recording.
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()>;
    /// Whether a recording is active and healthy.
    fn is_recording(&mut self) -> bool;
    /// Push one video frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()>;
    /// Push interleaved audio samples.
    fn push_audio(&mut self, interleaved: &[f32]) -> ReelResult<()>;
    /// Stop recording, flush, and return the final container once it is complete.
    fn end(&mut self) -> ReelResult<RecordedMedia>;
    /// Discard an in-progress recording. Idempotent.
    fn abort(&mut self);
}

/// First entry of `prefs` the sink supports, or [`ReelError::CaptureUnsupported`].
pub fn select_container(
    prefs: &[ContainerFormat],
    sink: &dyn CaptureSink,
) -> ReelResult<ContainerFormat> {
    for (i, &format) in prefs.iter().enumerate() {
        if sink.is_type_supported(format) {
            if i > 0 {
                tracing::warn!(
                    preferred = %prefs[0],
                    chosen = %format,
                    "preferred container unsupported; falling back"
                );
            }
            return Ok(format);
        }
    }
    Err(ReelError::capture_unsupported(format!(
        "none of [{}] can be recorded on this host",
        prefs
            .iter()
            .map(|f| f.mime())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// In-memory sink for tests and debugging.
#[derive(Debug)]
pub struct InMemorySink {
    supported: Vec<ContainerFormat>,
    stop_after_frames: Option<usize>,
    cfg: Option<SinkConfig>,
    recording: bool,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    audio: Vec<f32>,
    begin_count: usize,
    end_count: usize,
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySink {
    /// Sink that supports every container.
    pub fn new() -> Self {
        Self::supporting(&ContainerFormat::PREFERENCE)
    }

    /// Sink that only supports `formats`.
    pub fn supporting(formats: &[ContainerFormat]) -> Self {
        Self {
            supported: formats.to_vec(),
            stop_after_frames: None,
            cfg: None,
            recording: false,
            frames: Vec::new(),
            audio: Vec::new(),
            begin_count: 0,
            end_count: 0,
        }
    }

    /// Simulate a recorder that stops on its own after `n` frames.
    pub fn stop_after_frames(mut self, n: usize) -> Self {
        self.stop_after_frames = Some(n);
        self
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    /// Captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Captured interleaved audio.
    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    /// How many times `begin` was called.
    pub fn begin_count(&self) -> usize {
        self.begin_count
    }

    /// How many times `end` completed.
    pub fn end_count(&self) -> usize {
        self.end_count
    }
}

impl CaptureSink for InMemorySink {
    fn is_type_supported(&self, format: ContainerFormat) -> bool {
        self.supported.contains(&format)
    }

    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        if self.recording {
            return Err(ReelError::recording("sink is already recording"));
        }
        if !self.is_type_supported(cfg.format) {
            return Err(ReelError::capture_unsupported(cfg.format.mime()));
        }
        self.cfg = Some(cfg);
        self.frames.clear();
        self.audio.clear();
        self.recording = true;
        self.begin_count += 1;
        Ok(())
    }

    fn is_recording(&mut self) -> bool {
        self.recording
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        if !self.recording {
            return Err(ReelError::recording("sink is not recording"));
        }
        if let Some((last, _)) = self.frames.last()
            && idx <= *last
        {
            return Err(ReelError::recording("out-of-order frame index"));
        }
        self.frames.push((idx, frame.clone()));
        if self
            .stop_after_frames
            .is_some_and(|n| self.frames.len() >= n)
        {
            self.recording = false;
        }
        Ok(())
    }

    fn push_audio(&mut self, interleaved: &[f32]) -> ReelResult<()> {
        if self.cfg.is_none() {
            return Err(ReelError::recording("sink is not recording"));
        }
        self.audio.extend_from_slice(interleaved);
        Ok(())
    }

    fn end(&mut self) -> ReelResult<RecordedMedia> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::recording("sink was never started"))?;
        self.recording = false;
        self.end_count += 1;
        let summary = format!(
            "{} {}x{} frames={} audio_samples={}",
            cfg.format.mime(),
            cfg.width,
            cfg.height,
            self.frames.len(),
            self.audio.len()
        );
        Ok(RecordedMedia {
            bytes: summary.into_bytes(),
            format: cfg.format,
        })
    }

    fn abort(&mut self) {
        self.recording = false;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
