use std::sync::Arc;

use rodio::{OutputStream, OutputStreamBuilder, Sink, buffer::SamplesBuffer};

use crate::{
    audio::decode::DecodedAudio,
    foundation::error::{ReelError, ReelResult},
    preview::controller::AudioOutput,
};

/// Decode rate used for the default device; rodio converts to the device rate.
pub const RODIO_DECODE_RATE: u32 = 48_000;

/// Speaker output through the default rodio stream.
///
/// The clock is the sink's playback position, so it only moves while audio is actually played.
pub struct RodioOutput {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    clock_base: f64,
}

impl std::fmt::Debug for RodioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioOutput")
            .field("open", &self.stream.is_some())
            .field("playing", &self.sink.is_some())
            .field("clock_base", &self.clock_base)
            .finish()
    }
}

impl RodioOutput {
    /// Open the system's default output device.
    pub fn open_default() -> ReelResult<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| ReelError::graph(format!("no audio output device: {e}")))?;
        Ok(Self {
            stream: Some(stream),
            sink: None,
            clock_base: 0.0,
        })
    }
}

fn interleave(audio: &DecodedAudio) -> Vec<f32> {
    let channels = audio.channel_count();
    let mut out = Vec::with_capacity(audio.frames() * channels);
    for i in 0..audio.frames() {
        for ch in &audio.channels {
            out.push(ch[i]);
        }
    }
    out
}

impl AudioOutput for RodioOutput {
    fn sample_rate(&self) -> u32 {
        RODIO_DECODE_RATE
    }

    fn current_time(&self) -> f64 {
        self.clock_base + self.sink.as_ref().map_or(0.0, |s| s.get_pos().as_secs_f64())
    }

    fn play(&mut self, audio: Arc<DecodedAudio>, gain: f32) -> ReelResult<()> {
        self.stop();
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ReelError::graph("audio output is closed"))?;
        let channels = u16::try_from(audio.channel_count())
            .map_err(|_| ReelError::graph("too many channels for playback"))?;
        let sink = Sink::connect_new(stream.mixer());
        sink.append(SamplesBuffer::new(channels, audio.sample_rate, interleave(&audio)));
        sink.set_volume(gain);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            self.clock_base += sink.get_pos().as_secs_f64();
            sink.stop();
        }
    }

    fn set_gain(&mut self, gain: f32) -> ReelResult<()> {
        if let Some(sink) = &self.sink {
            sink.set_volume(gain);
        }
        Ok(())
    }

    fn has_ended(&self) -> bool {
        self.sink.as_ref().is_none_or(Sink::empty)
    }

    fn close(&mut self) {
        self.stop();
        self.stream = None;
    }
}
