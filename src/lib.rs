//! reelcast composes short vertical videos ("reels") from narration, still images and a
//! word-timed subtitle track, entirely in-process.
//!
//! The pipeline:
//!
//! - Decode narration with [`decode`] and estimate per-word timing with [`estimate`]
//! - Preview interactively through a [`PreviewController`] driven by an [`AudioOutput`] clock
//! - Export with [`export_reel`]: a [`ReelCompositor`] draws every frame on a [`FrameTimer`],
//!   a [`MixEngine`] mixes narration and music, and a [`CaptureSink`] writes the container
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assets;
mod audio;
mod encode;
mod export;
mod foundation;
mod preview;
mod project;
mod render;
mod timing;

pub use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Quality, Rect, Rgba8Premul};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assets::color::ColorRgba8;
pub use crate::assets::decode::{PreparedImage, decode_image};
pub use crate::assets::images::{ImageSource, load_images};

pub use crate::audio::decode::{
    AudioPayload, DecodedAudio, RAW_PCM_SAMPLE_RATE, decode, decode_raw_pcm,
};
pub use crate::audio::graph::{
    EngineState, MIX_CHANNELS, MixEngine, SourceId, SourceOpts, music_gain, narration_gain,
};

pub use crate::timing::estimate::{
    DEFAULT_CHARS_PER_SECOND, TimedScriptChunk, TimingOpts, WordTiming, estimate,
    script_lines_from_text, split_into_chunks,
};
pub use crate::timing::timeline::{WordState, active_chunk, image_index_at, progress};

pub use crate::render::backend::FrameRGBA;
pub use crate::render::compositor::{
    ImagePlacement, KenBurns, ReelCompositor, ReelScene, ken_burns_placement,
};
pub use crate::render::subtitle::{
    SubtitleLayout, SubtitleLayoutCache, SubtitleLayoutOpts, SubtitleLine, SubtitleStyle,
    layout_subtitle, scaled_font_px,
};
pub use crate::render::text::{BlockShaper, FontSpec, ParleyShaper, TextShaper};

pub use crate::preview::controller::{
    AudioOutput, CROSSFADE_SECS, HeadlessOutput, PREVIEW_MAX_ZOOM, PreviewController,
    PreviewFrame, PreviewState, PreviewWord,
};
#[cfg(feature = "playback")]
pub use crate::preview::rodio_output::{RODIO_DECODE_RATE, RodioOutput};

pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::sink::{
    AudioTrackConfig, CaptureSink, ContainerFormat, InMemorySink, RecordedMedia, SinkConfig,
    select_container,
};

pub use crate::export::pipeline::{
    ExportOpts, ExportRequest, ExportedVideo, MusicTrack, export_reel, sanitize_file_name,
};
pub use crate::export::timer::{FrameTimer, Pacing};

pub use crate::project::ReelProject;
