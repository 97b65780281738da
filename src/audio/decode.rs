//! Narration and music payload decoding.
//!
//! Two payload shapes are accepted:
//! - container-encoded audio (WAV, MP3, AAC/MP4, FLAC, Ogg Vorbis), probed and decoded with
//!   `symphonia` and resampled to the requested rate;
//! - raw headerless PCM: mono, signed 16-bit little-endian at [`RAW_PCM_SAMPLE_RATE`], the fixed
//!   output format of the narration synthesizer. No rate or channel negotiation happens here.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

use crate::{
    assets::images::decode_data_uri,
    foundation::error::{ReelError, ReelResult},
};

/// Fixed sample rate of raw narration PCM.
pub const RAW_PCM_SAMPLE_RATE: u32 = 24_000;

/// An encoded audio payload whose shape is already known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioPayload {
    /// Self-describing container bytes.
    Container(Vec<u8>),
    /// Headerless mono s16le PCM at 24 kHz.
    RawPcm(Vec<u8>),
}

impl AudioPayload {
    /// Classify a string payload: a `data:` URI is a container, any other string is base64 raw PCM.
    pub fn from_encoded_str(s: &str) -> ReelResult<Self> {
        let s = s.trim();
        if s.starts_with("data:") {
            let (_, bytes) = decode_data_uri(s)?;
            return Ok(Self::Container(bytes));
        }
        let bytes = general_purpose::STANDARD
            .decode(s)
            .map_err(|e| ReelError::decode(format!("raw pcm payload is not valid base64: {e}")))?;
        Ok(Self::RawPcm(bytes))
    }

    /// Read a payload from disk; `.pcm` and `.raw` files are raw PCM, everything else a container.
    pub fn from_path(path: &Path) -> ReelResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read audio '{}'", path.display()))?;
        let raw = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pcm") || e.eq_ignore_ascii_case("raw"));
        Ok(if raw {
            Self::RawPcm(bytes)
        } else {
            Self::Container(bytes)
        })
    }

    /// Resolve a manifest reference: a data URI, an existing file, or inline base64 raw PCM.
    ///
    /// A string that names no file and is not valid base64 reports the file read error.
    pub fn from_reference(reference: &str, base_dir: &Path) -> ReelResult<Self> {
        let r = reference.trim();
        if r.starts_with("data:") {
            return Self::from_encoded_str(r);
        }
        let path = base_dir.join(r);
        if path.is_file() {
            return Self::from_path(&path);
        }
        match Self::from_encoded_str(r) {
            Ok(payload) if !payload.is_empty() => Ok(payload),
            _ => Self::from_path(&path),
        }
    }

    /// Payload byte length.
    pub fn len(&self) -> usize {
        match self {
            Self::Container(b) | Self::RawPcm(b) => b.len(),
        }
    }

    /// Whether the payload has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded, planar, normalized audio. Never mutated after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    /// One buffer per channel, samples in [-1, 1].
    pub channels: Vec<Vec<f32>>,
    /// Sample rate of `channels`.
    pub sample_rate: u32,
    /// `frames / sample_rate`, in seconds.
    pub duration: f64,
}

impl DecodedAudio {
    fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> ReelResult<Self> {
        let frames = channels.first().map_or(0, Vec::len);
        if frames == 0 {
            return Err(ReelError::decode("payload decoded to zero samples"));
        }
        Ok(Self {
            duration: frames as f64 / f64::from(sample_rate),
            channels,
            sample_rate,
        })
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Channel count.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Decode `payload`. Container audio is resampled to `target_sample_rate`; raw PCM keeps its
/// fixed 24 kHz rate.
#[tracing::instrument(skip(payload), fields(bytes = payload.len()))]
pub fn decode(payload: &AudioPayload, target_sample_rate: u32) -> ReelResult<DecodedAudio> {
    if target_sample_rate == 0 {
        return Err(ReelError::validation("target sample rate must be > 0"));
    }
    if payload.is_empty() {
        return Err(ReelError::decode("audio payload is empty"));
    }
    let out = match payload {
        AudioPayload::RawPcm(bytes) => decode_raw_pcm(bytes)?,
        AudioPayload::Container(bytes) => {
            let (channels, rate) = decode_container(bytes)?;
            let channels = channels
                .iter()
                .map(|c| resample_linear(c, rate, target_sample_rate))
                .collect();
            DecodedAudio::new(channels, target_sample_rate)?
        }
    };
    tracing::debug!(
        channels = out.channel_count(),
        sample_rate = out.sample_rate,
        duration = out.duration,
        "audio decoded"
    );
    Ok(out)
}

/// Deinterleave mono s16le into one channel normalized by 32768.
pub fn decode_raw_pcm(bytes: &[u8]) -> ReelResult<DecodedAudio> {
    if bytes.len() % 2 != 0 {
        return Err(ReelError::decode(format!(
            "raw pcm byte length {} is not a whole number of 16-bit samples",
            bytes.len()
        )));
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
        .collect();
    DecodedAudio::new(vec![samples], RAW_PCM_SAMPLE_RATE)
}

fn decode_container(bytes: &[u8]) -> ReelResult<(Vec<Vec<f32>>, u32)> {
    // The stream takes ownership of its buffer.
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ReelError::decode(format!("unsupported or corrupt container: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| ReelError::decode("container has no audio track"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ReelError::decode(format!("unsupported codec: {e}")))?;

    let mut rate = codec_params.sample_rate;
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ReelError::decode(format!("container read failed: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = e, "skipping corrupt audio packet");
                continue;
            }
            Err(e) => return Err(ReelError::decode(format!("audio decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        if rate.is_none() {
            rate = Some(spec.rate);
        }
        let n_ch = spec.channels.count();
        if channels.is_empty() {
            channels = vec![Vec::new(); n_ch];
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_planar_ref(decoded);
        for (dst, src) in channels.iter_mut().zip(buf.samples().chunks(frames)) {
            dst.extend_from_slice(src);
        }
    }

    let rate = rate.ok_or_else(|| ReelError::decode("container reports no sample rate"))?;
    Ok((channels, rate))
}

/// Linear-interpolation resampler.
pub(crate) fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let i0 = (pos.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let frac = (pos - i0 as f64) as f32;
            samples[i0] + (samples[i1] - samples[i0]) * frac
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/audio/decode.rs"]
mod tests;
