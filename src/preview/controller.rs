//! Interactive preview state machine.
//!
//! The host owns the loop: it calls [`PreviewController::tick`] once per display refresh and
//! draws the returned [`PreviewFrame`]. Everything in the frame is derived from the audio
//! output's clock, read fresh on every tick.

use std::sync::Arc;

use crate::{
    audio::{
        decode::{AudioPayload, DecodedAudio, decode},
        graph::{MixEngine, SourceId, SourceOpts},
    },
    foundation::error::{ReelError, ReelResult},
    timing::{
        estimate::{TimedScriptChunk, TimingOpts, estimate},
        timeline::{WordState, active_chunk, image_index_at, progress},
    },
};

/// Seconds an incoming image takes to fade in.
pub const CROSSFADE_SECS: f64 = 0.6;
/// Zoom reached at the end of playback.
pub const PREVIEW_MAX_ZOOM: f64 = 1.15;

/// Audio device seen by the preview. Holds at most one voice at a time.
pub trait AudioOutput {
    /// Rate payloads should be decoded at.
    fn sample_rate(&self) -> u32;
    /// Output clock in seconds.
    fn current_time(&self) -> f64;
    /// Stop and disconnect the current voice, then start `audio` at the current clock.
    fn play(&mut self, audio: Arc<DecodedAudio>, gain: f32) -> ReelResult<()>;
    /// Stop and disconnect the current voice. Idempotent.
    fn stop(&mut self);
    /// Change the current voice's gain.
    fn set_gain(&mut self, gain: f32) -> ReelResult<()>;
    /// Whether the current voice played to its end, or there is none.
    fn has_ended(&self) -> bool;
    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// [`AudioOutput`] backed by a [`MixEngine`] whose clock advances only when pumped.
#[derive(Debug)]
pub struct HeadlessOutput {
    engine: MixEngine,
    voice: Option<SourceId>,
}

impl HeadlessOutput {
    /// Output running at `sample_rate`.
    pub fn new(sample_rate: u32) -> ReelResult<Self> {
        Ok(Self {
            engine: MixEngine::new(sample_rate)?,
            voice: None,
        })
    }

    /// Render `secs` of audio, advancing the clock. Returns interleaved stereo samples.
    pub fn pump(&mut self, secs: f64) -> ReelResult<Vec<f32>> {
        let target = self.engine.current_time() + secs.max(0.0);
        self.engine.render_until(target)
    }

    /// Underlying engine.
    pub fn engine(&self) -> &MixEngine {
        &self.engine
    }
}

impl AudioOutput for HeadlessOutput {
    fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.engine.current_time()
    }

    fn play(&mut self, audio: Arc<DecodedAudio>, gain: f32) -> ReelResult<()> {
        self.stop();
        let id = self.engine.add_source(audio, SourceOpts { gain, looped: false })?;
        self.engine.start_source(id)?;
        self.voice = Some(id);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(id) = self.voice.take() {
            self.engine.stop_source(id);
            self.engine.disconnect(id);
        }
    }

    fn set_gain(&mut self, gain: f32) -> ReelResult<()> {
        match self.voice {
            Some(id) => self.engine.set_gain(id, gain),
            None => Ok(()),
        }
    }

    fn has_ended(&self) -> bool {
        self.voice.is_none_or(|id| self.engine.has_ended(id))
    }

    fn close(&mut self) {
        self.stop();
        self.engine.close();
    }
}

/// Where the preview is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
    /// Narration not decoded yet.
    Loading,
    /// Narration failed to decode; only the title is shown.
    Unavailable,
    /// Ready, not playing.
    Idle,
    /// Playing.
    Playing,
}

/// A word and how to draw it.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PreviewWord {
    /// Word text.
    pub text: String,
    /// Highlight state.
    pub state: WordState,
}

/// Everything the host needs to draw one preview tick.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PreviewFrame {
    /// Lifecycle state after this tick.
    pub state: PreviewState,
    /// Seconds since playback started, 0 when not playing.
    pub elapsed: f64,
    /// Image shown on top, if there are images.
    pub image_index: Option<usize>,
    /// Image fading out beneath `image_index`.
    pub previous_image: Option<usize>,
    /// Opacity of `image_index`, 0..=1.
    pub crossfade: f64,
    /// Image scale.
    pub zoom: f64,
    /// Active subtitle chunk.
    pub chunk_index: Option<usize>,
    /// Words of the active chunk.
    pub words: Vec<PreviewWord>,
    /// Title, shown whenever no subtitle is.
    pub title: Option<String>,
    /// Whether output is muted.
    pub muted: bool,
}

/// Single-instance interactive preview.
///
/// Fields are read on every tick, so changing them between ticks takes effect immediately.
pub struct PreviewController<O: AudioOutput> {
    output: O,
    title: String,
    image_count: usize,
    chunks: Vec<TimedScriptChunk>,
    audio: Option<Arc<DecodedAudio>>,
    state: PreviewState,
    muted: bool,
    start_clock: f64,
    last_error: Option<String>,
}

impl<O: AudioOutput> std::fmt::Debug for PreviewController<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewController")
            .field("state", &self.state)
            .field("images", &self.image_count)
            .field("chunks", &self.chunks.len())
            .field("muted", &self.muted)
            .finish_non_exhaustive()
    }
}

impl<O: AudioOutput> PreviewController<O> {
    /// Controller waiting for narration.
    pub fn new(output: O, title: impl Into<String>, image_count: usize) -> Self {
        Self {
            output,
            title: title.into(),
            image_count,
            chunks: Vec::new(),
            audio: None,
            state: PreviewState::Loading,
            muted: false,
            start_clock: 0.0,
            last_error: None,
        }
    }

    /// Decode narration and estimate timing for `script`.
    ///
    /// On failure the controller degrades to [`PreviewState::Unavailable`] and keeps serving
    /// title-only frames; the error is also returned.
    pub fn load<S: AsRef<str>>(
        &mut self,
        narration: &AudioPayload,
        script: &[S],
        timing: &TimingOpts,
    ) -> ReelResult<()> {
        self.stop_playback();
        let loaded = decode(narration, self.output.sample_rate()).and_then(|audio| {
            let chunks = estimate(script, audio.duration, timing)?;
            Ok((audio, chunks))
        });
        match loaded {
            Ok((audio, chunks)) => {
                self.set_audio(Arc::new(audio), chunks);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "preview narration unavailable");
                self.audio = None;
                self.chunks.clear();
                self.state = PreviewState::Unavailable;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Use already decoded narration and chunks.
    pub fn set_audio(&mut self, audio: Arc<DecodedAudio>, chunks: Vec<TimedScriptChunk>) {
        self.stop_playback();
        tracing::debug!(duration = audio.duration, chunks = chunks.len(), "preview ready");
        self.audio = Some(audio);
        self.chunks = chunks;
        self.state = PreviewState::Idle;
        self.last_error = None;
    }

    /// Lifecycle state.
    pub fn state(&self) -> PreviewState {
        self.state
    }

    /// Why narration is unavailable, if it is.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Narration duration, 0 until loaded.
    pub fn duration(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |a| a.duration)
    }

    /// Timed chunks in use.
    pub fn chunks(&self) -> &[TimedScriptChunk] {
        &self.chunks
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Audio output.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Mutable audio output, for hosts that drive the clock.
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Start from the beginning. Any voice still sounding is stopped first.
    pub fn play(&mut self) -> ReelResult<()> {
        let audio = match (self.state, &self.audio) {
            (PreviewState::Idle | PreviewState::Playing, Some(audio)) => Arc::clone(audio),
            _ => return Err(ReelError::validation("preview is not ready to play")),
        };
        self.output.play(audio, self.gain())?;
        self.start_clock = self.output.current_time();
        self.state = PreviewState::Playing;
        Ok(())
    }

    /// Stop and rewind to the start.
    pub fn pause(&mut self) {
        self.stop_playback();
    }

    /// Play when idle, pause when playing.
    pub fn toggle(&mut self) -> ReelResult<()> {
        if self.state == PreviewState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Flip mute. Applies to the current voice immediately.
    pub fn toggle_mute(&mut self) -> ReelResult<()> {
        self.muted = !self.muted;
        self.output.set_gain(self.gain())
    }

    fn gain(&self) -> f32 {
        if self.muted { 0.0 } else { 1.0 }
    }

    fn stop_playback(&mut self) {
        self.output.stop();
        if self.state == PreviewState::Playing {
            self.state = PreviewState::Idle;
        }
        self.start_clock = 0.0;
    }

    /// Advance one animation tick.
    pub fn tick(&mut self) -> PreviewFrame {
        if self.state == PreviewState::Playing && self.output.has_ended() {
            tracing::debug!("preview narration ended");
            self.stop_playback();
        }

        if self.state != PreviewState::Playing {
            return PreviewFrame {
                state: self.state,
                elapsed: 0.0,
                image_index: (self.image_count > 0).then_some(0),
                previous_image: None,
                crossfade: 1.0,
                zoom: 1.0,
                chunk_index: None,
                words: Vec::new(),
                title: Some(self.title.clone()),
                muted: self.muted,
            };
        }

        let duration = self.duration();
        let elapsed = (self.output.current_time() - self.start_clock).max(0.0);
        let image_index = image_index_at(elapsed, duration, self.image_count);
        let (previous_image, crossfade) = match image_index {
            Some(i) if i > 0 => {
                let segment_start = duration / self.image_count as f64 * i as f64;
                let t = ((elapsed - segment_start) / CROSSFADE_SECS).clamp(0.0, 1.0);
                ((t < 1.0).then_some(i - 1), t)
            }
            _ => (None, 1.0),
        };

        let active = active_chunk(&self.chunks, elapsed);
        let words: Vec<PreviewWord> = active
            .map(|(_, chunk)| {
                chunk
                    .words
                    .iter()
                    .map(|w| PreviewWord {
                        text: w.word.clone(),
                        state: WordState::at(w, elapsed),
                    })
                    .collect()
            })
            .unwrap_or_default();

        PreviewFrame {
            state: self.state,
            elapsed,
            image_index,
            previous_image,
            crossfade,
            zoom: 1.0 + (PREVIEW_MAX_ZOOM - 1.0) * progress(elapsed, duration),
            chunk_index: active.map(|(i, _)| i),
            words,
            title: active.is_none().then(|| self.title.clone()),
            muted: self.muted,
        }
    }

    /// Stop and release the audio output. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        self.stop_playback();
        self.output.close();
    }
}

impl<O: AudioOutput> Drop for PreviewController<O> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/preview/controller.rs"]
mod tests;
