//! Capture sinks.
//!
//! Sinks receive rendered frames and mixed audio in timeline order and produce the final
//! container bytes.

pub(crate) mod ffmpeg;
pub(crate) mod sink;
