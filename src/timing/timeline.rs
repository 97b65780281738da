use crate::timing::estimate::{TimedScriptChunk, WordTiming};

/// Visual state of a word relative to the playback clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WordState {
    /// Not spoken yet; drawn fully transparent.
    Upcoming,
    /// Being spoken; highlighted.
    Current,
    /// Already spoken; default colour.
    Spoken,
}

impl WordState {
    /// State of `word` at `elapsed` seconds.
    pub fn at(word: &WordTiming, elapsed: f64) -> Self {
        if elapsed < word.start {
            Self::Upcoming
        } else if elapsed < word.end {
            Self::Current
        } else {
            Self::Spoken
        }
    }
}

/// The chunk whose `[start, end)` contains `elapsed`, with its index.
pub fn active_chunk(chunks: &[TimedScriptChunk], elapsed: f64) -> Option<(usize, &TimedScriptChunk)> {
    // Chunks are contiguous and ordered, so the first chunk ending after `elapsed` is the only
    // candidate.
    let i = chunks.partition_point(|c| c.end <= elapsed);
    chunks
        .get(i)
        .filter(|c| c.contains(elapsed))
        .map(|c| (i, c))
}

/// Index of the image shown at `elapsed` when `image_count` images split `duration` evenly.
///
/// Returns `None` when there are no images.
pub fn image_index_at(elapsed: f64, duration: f64, image_count: usize) -> Option<usize> {
    if image_count == 0 {
        return None;
    }
    let last = image_count - 1;
    if duration <= 0.0 || elapsed.is_nan() {
        return Some(0);
    }
    let segment = duration / image_count as f64;
    let idx = (elapsed / segment).floor();
    if idx <= 0.0 {
        return Some(0);
    }
    Some((idx as usize).min(last))
}

/// Clamped `elapsed / duration` in 0..=1.
pub fn progress(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

#[cfg(test)]
#[path = "../../tests/unit/timing/timeline.rs"]
mod tests;
