use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};
use rayon::prelude::*;

use crate::{
    assets::decode::{PreparedImage, decode_image},
    foundation::error::{ReelError, ReelResult},
};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a still image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file.
    Path(PathBuf),
    /// `http(s)` URL fetched with a blocking client.
    Url(String),
    /// `data:<mime>;base64,<payload>` URI.
    DataUri(String),
    /// Bytes already in memory.
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classify a manifest reference: URLs and data URIs by prefix, anything else is a path.
    pub fn from_reference(reference: &str) -> Self {
        let r = reference.trim();
        if r.starts_with("data:") {
            Self::DataUri(r.to_owned())
        } else if r.starts_with("http://") || r.starts_with("https://") {
            Self::Url(r.to_owned())
        } else {
            Self::Path(PathBuf::from(r))
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Url(u) => u.clone(),
            Self::DataUri(s) => format!("data uri ({} bytes)", s.len()),
            Self::Bytes(b) => format!("in-memory image ({} bytes)", b.len()),
        }
    }

    fn read_bytes(&self) -> ReelResult<Vec<u8>> {
        match self {
            Self::Path(p) => {
                Ok(std::fs::read(p).with_context(|| format!("read image '{}'", p.display()))?)
            }
            Self::Url(u) => fetch_url(u),
            Self::DataUri(s) => {
                let (_, bytes) = decode_data_uri(s)?;
                Ok(bytes)
            }
            Self::Bytes(b) => Ok(b.clone()),
        }
    }

    /// Load and decode this image; every failure is an [`ReelError::AssetLoad`].
    pub fn load(&self) -> ReelResult<PreparedImage> {
        let bytes = self
            .read_bytes()
            .map_err(|e| ReelError::asset_load(format!("{}: {e}", self.describe())))?;
        decode_image(&bytes)
            .map_err(|e| ReelError::asset_load(format!("{}: {e}", self.describe())))
    }
}

fn fetch_url(url: &str) -> ReelResult<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("build http client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    let bytes = response.bytes().context("read response body")?;
    Ok(bytes.to_vec())
}

/// Split a `data:` URI into its media type and decoded payload.
///
/// Only base64 payloads are accepted.
pub(crate) fn decode_data_uri(uri: &str) -> ReelResult<(String, Vec<u8>)> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| ReelError::validation("data uri must start with 'data:'"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ReelError::validation("data uri is missing ','"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ReelError::validation("only base64 data uris are supported"))?;
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ReelError::validation(format!("invalid base64 in data uri: {e}")))?;
    Ok((mime.to_owned(), bytes))
}

/// Load every image concurrently, preserving order.
///
/// A failed image yields `None` and a warning; it never fails the batch.
#[tracing::instrument(skip(sources), fields(count = sources.len()))]
pub fn load_images(sources: &[ImageSource]) -> Vec<Option<PreparedImage>> {
    sources
        .par_iter()
        .enumerate()
        .map(|(i, src)| match src.load() {
            Ok(img) => {
                tracing::debug!(index = i, width = img.width, height = img.height, "image loaded");
                Some(img)
            }
            Err(e) => {
                tracing::warn!(index = i, error = %e, "image failed to load; segment will be skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/assets/images.rs"]
mod tests;
