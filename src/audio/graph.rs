//! A small pull-based audio graph: sources -> per-source gain -> mix bus -> output.
//!
//! The engine owns its own sample clock. [`MixEngine::current_time`] only advances as frames are
//! rendered, so everything timed against it stays phase-locked with the audio that was produced.

use std::sync::Arc;

use crate::{
    audio::decode::DecodedAudio,
    foundation::error::{ReelError, ReelResult},
};

/// Output channel count of the mix bus.
pub const MIX_CHANNELS: u16 = 2;

/// Handle of a source node inside one [`MixEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

/// Per-source settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceOpts {
    /// Linear gain applied before the mix bus.
    pub gain: f32,
    /// Restart from the beginning when the buffer runs out.
    pub looped: bool,
}

impl Default for SourceOpts {
    fn default() -> Self {
        Self {
            gain: 1.0,
            looped: false,
        }
    }
}

/// Lifecycle of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Clock advances as frames are rendered.
    Running,
    /// Resources released; every further graph operation fails.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Playback {
    Idle,
    Playing { start_frame: u64 },
    Stopped,
}

#[derive(Debug)]
struct SourceNode {
    buffer: Arc<DecodedAudio>,
    opts: SourceOpts,
    playback: Playback,
    connected: bool,
}

/// Gain of the narration bus. Attenuated when background music is mixed in so speech stays on top.
pub fn narration_gain(music_volume: Option<u8>) -> f32 {
    match music_volume {
        Some(v) => 1.0 - f32::from(v.min(100)) / 200.0,
        None => 1.0,
    }
}

/// Gain of the music bus from a 0..=100 volume parameter.
pub fn music_gain(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}

/// Offline mixing engine with an exclusively owned clock.
#[derive(Debug)]
pub struct MixEngine {
    sample_rate: u32,
    frames_rendered: u64,
    state: EngineState,
    sources: Vec<SourceNode>,
}

impl MixEngine {
    /// Create a running engine at `sample_rate`.
    pub fn new(sample_rate: u32) -> ReelResult<Self> {
        if sample_rate == 0 {
            return Err(ReelError::graph("engine sample rate must be > 0"));
        }
        Ok(Self {
            sample_rate,
            frames_rendered: 0,
            state: EngineState::Running,
            sources: Vec::new(),
        })
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Engine lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn ensure_open(&self) -> ReelResult<()> {
        if self.state == EngineState::Closed {
            return Err(ReelError::graph("audio engine is closed"));
        }
        Ok(())
    }

    fn node_mut(&mut self, id: SourceId) -> ReelResult<&mut SourceNode> {
        self.ensure_open()?;
        self.sources
            .get_mut(id.0)
            .ok_or_else(|| ReelError::graph(format!("unknown source {}", id.0)))
    }

    /// Connect a new source to the mix bus. It stays silent until started.
    pub fn add_source(&mut self, buffer: Arc<DecodedAudio>, opts: SourceOpts) -> ReelResult<SourceId> {
        self.ensure_open()?;
        if buffer.frames() == 0 || buffer.channel_count() == 0 {
            return Err(ReelError::graph("cannot play an empty buffer"));
        }
        self.sources.push(SourceNode {
            buffer,
            opts,
            playback: Playback::Idle,
            connected: true,
        });
        Ok(SourceId(self.sources.len() - 1))
    }

    /// Start a source at the current clock. A source can only be started once.
    pub fn start_source(&mut self, id: SourceId) -> ReelResult<()> {
        let start_frame = self.frames_rendered;
        let node = self.node_mut(id)?;
        if node.playback != Playback::Idle {
            return Err(ReelError::graph(format!("source {} already started", id.0)));
        }
        node.playback = Playback::Playing { start_frame };
        Ok(())
    }

    /// Stop a source. Stopping twice, or after close, is a no-op.
    pub fn stop_source(&mut self, id: SourceId) {
        if let Some(node) = self.sources.get_mut(id.0) {
            node.playback = Playback::Stopped;
        }
    }

    /// Detach a source from the mix bus. Idempotent.
    pub fn disconnect(&mut self, id: SourceId) {
        if let Some(node) = self.sources.get_mut(id.0) {
            node.connected = false;
        }
    }

    /// Change a source's gain.
    pub fn set_gain(&mut self, id: SourceId, gain: f32) -> ReelResult<()> {
        self.node_mut(id)?.opts.gain = gain;
        Ok(())
    }

    /// Whether a source has stopped or played to its natural end.
    pub fn has_ended(&self, id: SourceId) -> bool {
        self.sources
            .get(id.0)
            .is_none_or(|n| n.playback == Playback::Stopped)
    }

    /// Render `frames` interleaved stereo frames and advance the clock.
    pub fn render(&mut self, frames: usize) -> ReelResult<Vec<f32>> {
        self.ensure_open()?;
        if frames == 0 {
            return Ok(Vec::new());
        }

        let channels = usize::from(MIX_CHANNELS);
        let mut out = vec![0.0f32; frames * channels];
        let first = self.frames_rendered;
        let out_rate = self.sample_rate;
        for node in &mut self.sources {
            mix_node(&mut out, node, first, out_rate);
        }
        for s in &mut out {
            *s = s.clamp(-1.0, 1.0);
        }
        self.frames_rendered += frames as u64;
        Ok(out)
    }

    /// Render everything between the current clock and `t` seconds.
    pub fn render_until(&mut self, t: f64) -> ReelResult<Vec<f32>> {
        let target = (t.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let frames = target.saturating_sub(self.frames_rendered) as usize;
        self.render(frames)
    }

    /// Release every node. Idempotent.
    pub fn close(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        self.sources.clear();
        self.state = EngineState::Closed;
        tracing::debug!(seconds = self.current_time(), "audio engine closed");
    }
}

fn mix_node(out: &mut [f32], node: &mut SourceNode, first_frame: u64, out_rate: u32) {
    let Playback::Playing { start_frame } = node.playback else {
        return;
    };
    let src = node.buffer.as_ref();
    let src_frames = src.frames();
    let step = f64::from(src.sample_rate) / f64::from(out_rate);
    let channels = usize::from(MIX_CHANNELS);
    let frames = out.len() / channels;
    let gain = node.opts.gain;

    for i in 0..frames {
        let dst_frame = first_frame + i as u64;
        let Some(rel) = dst_frame.checked_sub(start_frame) else {
            continue;
        };
        let mut pos = rel as f64 * step;
        if pos >= src_frames as f64 {
            if !node.opts.looped {
                node.playback = Playback::Stopped;
                return;
            }
            pos %= src_frames as f64;
        }
        if !node.connected || gain == 0.0 {
            continue;
        }

        let i0 = pos.floor() as usize;
        let i1 = if i0 + 1 < src_frames {
            i0 + 1
        } else if node.opts.looped {
            0
        } else {
            i0
        };
        let frac = (pos - i0 as f64) as f32;
        let sample = |c: &Vec<f32>| c[i0] + (c[i1] - c[i0]) * frac;

        let l = sample(&src.channels[0]);
        let r = src.channels.get(1).map_or(l, sample);
        out[i * channels] += l * gain;
        out[i * channels + 1] += r * gain;
    }

    if !node.opts.looped {
        let next = first_frame + frames as u64;
        let rel = next.saturating_sub(start_frame) as f64 * step;
        if rel >= src_frames as f64 {
            node.playback = Playback::Stopped;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/graph.rs"]
mod tests;
