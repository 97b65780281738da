//! Offline export: composite every frame on a fixed timer, mix narration and music, and capture
//! both into one container.

use std::sync::Arc;

use crate::{
    assets::{
        decode::PreparedImage,
        images::{ImageSource, load_images},
    },
    audio::{
        decode::{AudioPayload, DecodedAudio, decode},
        graph::{MIX_CHANNELS, MixEngine, SourceId, SourceOpts, music_gain, narration_gain},
    },
    encode::sink::{
        AudioTrackConfig, CaptureSink, ContainerFormat, RecordedMedia, SinkConfig,
        select_container,
    },
    export::timer::{FrameTimer, Pacing},
    foundation::{
        core::{Canvas, Fps, FrameIndex},
        error::{ReelError, ReelResult},
    },
    render::{
        compositor::{ReelCompositor, ReelScene},
        subtitle::SubtitleStyle,
        text::TextShaper,
    },
    timing::estimate::{TimingOpts, estimate},
};

/// Background music bed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MusicTrack {
    /// Encoded music.
    pub payload: AudioPayload,
    /// Volume, 0..=100.
    pub volume: u8,
}

/// Everything one export consumes.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    /// Title or topic; the download name is derived from it.
    pub title: String,
    /// Script lines, already edited.
    pub script: Vec<String>,
    /// Narration payload.
    pub narration: AudioPayload,
    /// Images, one equal-length segment each.
    pub images: Vec<ImageSource>,
    /// Optional music bed.
    pub music: Option<MusicTrack>,
    /// Output size.
    pub canvas: Canvas,
    /// Subtitle look.
    pub style: SubtitleStyle,
    /// Chunking knobs.
    pub timing: TimingOpts,
}

/// Export knobs.
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Capture frame rate.
    pub fps: Fps,
    /// Seconds recorded past the narration end so the encoder can flush trailing audio.
    pub tail_secs: f64,
    /// Mix engine sample rate.
    pub sample_rate: u32,
    /// Timer pacing.
    pub pacing: Pacing,
    /// Containers in order of preference.
    pub container_prefs: Vec<ContainerFormat>,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            fps: Fps { num: 30, den: 1 },
            tail_secs: 0.5,
            sample_rate: 48_000,
            pacing: Pacing::Virtual,
            container_prefs: ContainerFormat::PREFERENCE.to_vec(),
        }
    }
}

/// Finished export, ready to be saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedVideo {
    /// Container bytes.
    pub bytes: Vec<u8>,
    /// Container used.
    pub format: ContainerFormat,
    /// Extension without the dot.
    pub extension: &'static str,
    /// Suggested download name, `<sanitized title>.<extension>`.
    pub file_name: String,
    /// Frames captured.
    pub frames: u64,
}

/// Download-safe stem: every non-alphanumeric ASCII char becomes `_`, lowercased.
pub fn sanitize_file_name(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return "video".to_owned();
    }
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

struct LoadedInputs {
    images: Vec<Option<PreparedImage>>,
    narration: DecodedAudio,
    music: Option<(DecodedAudio, u8)>,
}

fn load_inputs(req: &ExportRequest, sample_rate: u32) -> ReelResult<LoadedInputs> {
    let (images, (narration, music)) = rayon::join(
        || load_images(&req.images),
        || {
            rayon::join(
                || decode(&req.narration, sample_rate),
                || {
                    req.music
                        .as_ref()
                        .map(|m| decode(&m.payload, sample_rate).map(|a| (a, m.volume)))
                },
            )
        },
    );

    let narration = narration
        .map_err(|e| ReelError::audio_unavailable(format!("narration could not be decoded: {e}")))?;
    if !images.iter().any(Option::is_some) {
        return Err(ReelError::no_image(format!(
            "none of the {} images could be loaded",
            images.len()
        )));
    }
    let music = match music {
        Some(Ok(m)) => Some(m),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "background music failed to decode; exporting without it");
            None
        }
        None => None,
    };
    Ok(LoadedInputs {
        images,
        narration,
        music,
    })
}

/// One capture in flight. Every exit path releases it through [`CaptureSession::finish`].
struct CaptureSession<'a> {
    sink: &'a mut dyn CaptureSink,
    engine: MixEngine,
    timer: FrameTimer,
    sources: Vec<SourceId>,
    done: bool,
}

impl CaptureSession<'_> {
    /// Halt the timer, stop the recorder, stop every source and close the engine.
    ///
    /// With `keep` the recorder is finalized and its media returned; otherwise it is discarded.
    /// Idempotent: later calls return `None`.
    fn finish(&mut self, keep: bool) -> Option<ReelResult<RecordedMedia>> {
        if self.done {
            return None;
        }
        self.done = true;
        self.timer.cancel();
        let media = if keep {
            Some(self.sink.end())
        } else {
            self.sink.abort();
            None
        };
        for &id in &self.sources {
            self.engine.stop_source(id);
            self.engine.disconnect(id);
        }
        self.engine.close();
        media
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("capture session dropped before completion; discarding recording");
        }
        let _ = self.finish(false);
    }
}

/// Render and capture a reel.
///
/// Fails with [`ReelError::AudioUnavailable`] when narration cannot be decoded or started,
/// [`ReelError::NoImageAvailable`] when every image fails (before capture starts), and
/// [`ReelError::Recording`] or [`ReelError::CaptureUnsupported`] for recorder problems. A broken
/// music bed is logged and skipped.
#[tracing::instrument(skip_all, fields(title = %req.title, images = req.images.len()))]
pub fn export_reel<S: TextShaper>(
    req: &ExportRequest,
    opts: &ExportOpts,
    shaper: S,
    sink: &mut dyn CaptureSink,
) -> ReelResult<ExportedVideo> {
    if !opts.tail_secs.is_finite() || opts.tail_secs < 0.0 {
        return Err(ReelError::validation("tail_secs must be finite and >= 0"));
    }
    let fps = Fps::new(opts.fps.num, opts.fps.den)?;

    let inputs = load_inputs(req, opts.sample_rate)?;
    let duration = inputs.narration.duration;
    let chunks = estimate(&req.script, duration, &req.timing)?;
    tracing::info!(
        duration,
        chunks = chunks.len(),
        music = inputs.music.is_some(),
        "export inputs ready"
    );

    let scene = ReelScene {
        canvas: req.canvas,
        duration,
        chunks,
        style: req.style.clone(),
    };
    let mut compositor = ReelCompositor::new(scene, &inputs.images, shaper)?;
    if !compositor.has_any_image() {
        return Err(ReelError::no_image("no loaded image can be drawn"));
    }

    let format = select_container(&opts.container_prefs, &*sink)?;

    let mut engine = MixEngine::new(opts.sample_rate)?;
    let music_volume = inputs.music.as_ref().map(|(_, v)| *v);
    let narration = engine
        .add_source(
            Arc::new(inputs.narration),
            SourceOpts {
                gain: narration_gain(music_volume),
                looped: false,
            },
        )
        .map_err(|e| ReelError::audio_unavailable(e.to_string()))?;
    let mut sources = vec![narration];
    let music = match inputs.music {
        Some((audio, volume)) => {
            let added = engine.add_source(
                Arc::new(audio),
                SourceOpts {
                    gain: music_gain(volume),
                    looped: true,
                },
            );
            match added {
                Ok(id) => {
                    sources.push(id);
                    Some(id)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "background music could not be connected");
                    None
                }
            }
        }
        None => None,
    };

    let timer = FrameTimer::from_fps(fps, opts.pacing)?;
    let cfg = SinkConfig {
        width: req.canvas.width,
        height: req.canvas.height,
        fps,
        format,
        audio: Some(AudioTrackConfig {
            sample_rate: opts.sample_rate,
            channels: MIX_CHANNELS,
        }),
    };
    sink.begin(cfg)?;
    let mut session = CaptureSession {
        sink,
        engine,
        timer,
        sources,
        done: false,
    };

    session
        .engine
        .start_source(narration)
        .map_err(|e| ReelError::audio_unavailable(format!("narration could not start: {e}")))?;
    if let Some(id) = music
        && let Err(e) = session.engine.start_source(id)
    {
        tracing::warn!(error = %e, "background music could not start");
    }
    let start_clock = session.engine.current_time();

    let stop_at = duration + opts.tail_secs;
    let mut frames = 0u64;
    while let Some(at) = session.timer.next_tick() {
        let audio = session
            .engine
            .render_until(start_clock + at.as_secs_f64())?;
        if !audio.is_empty() {
            session.sink.push_audio(&audio)?;
        }

        let elapsed = session.engine.current_time() - start_clock;
        if elapsed >= stop_at {
            break;
        }
        if !session.sink.is_recording() {
            tracing::warn!(frames, elapsed, "recorder stopped before the timeline ended");
            break;
        }

        let frame = compositor.draw_frame(elapsed)?;
        session.sink.push_frame(FrameIndex(frames), &frame)?;
        frames += 1;
    }

    let media = session
        .finish(true)
        .ok_or_else(|| ReelError::recording("capture session already finished"))??;
    if media.bytes.is_empty() {
        return Err(ReelError::recording("recorder returned no data"));
    }

    tracing::info!(
        frames,
        bytes = media.bytes.len(),
        format = %media.format,
        subtitle_layouts = compositor.subtitle_cache().recomputations(),
        "export finished"
    );
    let extension = media.format.extension();
    Ok(ExportedVideo {
        file_name: format!("{}.{extension}", sanitize_file_name(&req.title)),
        extension,
        format: media.format,
        bytes: media.bytes,
        frames,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/export/pipeline.rs"]
mod tests;
