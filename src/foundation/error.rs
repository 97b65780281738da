/// Convenience result type used across reelcast.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy used by compositor APIs.
///
/// Export operations surface one of [`ReelError::NoImageAvailable`], [`ReelError::Recording`] or
/// [`ReelError::AudioUnavailable`] so callers can present targeted retry guidance.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid user-provided data (script, style, options, manifest).
    #[error("validation error: {0}")]
    Validation(String),

    /// An audio payload is empty, corrupt or uses an unsupported codec.
    #[error("decode error: {0}")]
    Decode(String),

    /// A single image failed to load. Recovered locally by the compositor.
    #[error("asset load error: {0}")]
    AssetLoad(String),

    /// Every image of the reel failed to load; nothing could ever be shown.
    #[error("no image available: {0}")]
    NoImageAvailable(String),

    /// No container/codec combination is supported by the capture host.
    #[error("capture unsupported: {0}")]
    CaptureUnsupported(String),

    /// Audio graph construction or scheduling failed.
    #[error("audio graph error: {0}")]
    Graph(String),

    /// Narration audio could not be decoded or started for export.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// The recorder or encoder failed while capturing or finalizing output.
    #[error("recording failed: {0}")]
    Recording(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`ReelError::AssetLoad`] value.
    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    /// Build a [`ReelError::NoImageAvailable`] value.
    pub fn no_image(msg: impl Into<String>) -> Self {
        Self::NoImageAvailable(msg.into())
    }

    /// Build a [`ReelError::CaptureUnsupported`] value.
    pub fn capture_unsupported(msg: impl Into<String>) -> Self {
        Self::CaptureUnsupported(msg.into())
    }

    /// Build a [`ReelError::Graph`] value.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Build a [`ReelError::AudioUnavailable`] value.
    pub fn audio_unavailable(msg: impl Into<String>) -> Self {
        Self::AudioUnavailable(msg.into())
    }

    /// Build a [`ReelError::Recording`] value.
    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording(msg.into())
    }

    /// Build a [`ReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
