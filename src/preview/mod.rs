pub(crate) mod controller;
#[cfg(feature = "playback")]
pub(crate) mod rodio_output;
