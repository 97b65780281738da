use serde::{Deserialize, Serialize};

use crate::foundation::error::{ReelError, ReelResult};

/// Speaking rate assumed when a script has no characters at all.
pub const DEFAULT_CHARS_PER_SECOND: f64 = 10.0;

/// Estimated timing of one spoken word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    /// The word as shown on screen.
    pub word: String,
    /// Start, in seconds from narration start.
    pub start: f64,
    /// End, in seconds from narration start.
    pub end: f64,
}

/// A subtitle display unit: a bounded group of words with its time span.
///
/// Chunks produced by [`estimate`] are contiguous: each starts where the previous one ends, the
/// first starts at 0 and the last ends at the narration duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedScriptChunk {
    /// Words joined by single spaces.
    pub text: String,
    /// Start, in seconds.
    pub start: f64,
    /// End, in seconds.
    pub end: f64,
    /// Per-word timings, ordered, covering `[start, end)`.
    pub words: Vec<WordTiming>,
}

impl TimedScriptChunk {
    /// Whether `t` falls inside `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Estimator knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingOpts {
    /// Maximum words per subtitle chunk.
    pub max_words_per_chunk: usize,
}

impl Default for TimingOpts {
    fn default() -> Self {
        Self {
            max_words_per_chunk: 4,
        }
    }
}

/// Split edited script text into lines, dropping blank ones.
pub fn script_lines_from_text(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Group a line's whitespace-separated words into chunks of at most `max_words`.
pub fn split_into_chunks(line: &str, max_words: usize) -> Vec<Vec<&str>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(<[&str]>::to_vec)
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Assign each chunk and word a time span proportional to its character count.
///
/// Each word's effective length is its character count plus one for the following space, except
/// the chunk's last word. A chunk's length is therefore the length of its joined text.
/// Blank lines produce no chunks.
#[tracing::instrument(skip(lines), fields(lines = lines.len()))]
pub fn estimate<S: AsRef<str>>(
    lines: &[S],
    total_duration: f64,
    opts: &TimingOpts,
) -> ReelResult<Vec<TimedScriptChunk>> {
    if !total_duration.is_finite() || total_duration < 0.0 {
        return Err(ReelError::validation(format!(
            "narration duration must be finite and >= 0, got {total_duration}"
        )));
    }
    if opts.max_words_per_chunk == 0 {
        return Err(ReelError::validation("max_words_per_chunk must be > 0"));
    }

    let groups: Vec<Vec<&str>> = lines
        .iter()
        .flat_map(|l| split_into_chunks(l.as_ref(), opts.max_words_per_chunk))
        .collect();
    let texts: Vec<String> = groups.iter().map(|g| g.join(" ")).collect();
    let total_chars: usize = texts.iter().map(|t| char_len(t)).sum();

    // Zero duration collapses every span to zero instead of dividing by zero.
    let secs_per_char = if total_chars == 0 {
        1.0 / DEFAULT_CHARS_PER_SECOND
    } else {
        total_duration / total_chars as f64
    };

    let mut clock = 0.0f64;
    let mut chunks = Vec::with_capacity(groups.len());
    for (words, text) in groups.iter().zip(texts) {
        let chunk_start = clock;
        let chunk_end = chunk_start + char_len(&text) as f64 * secs_per_char;

        let mut word_clock = chunk_start;
        let mut timed = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            let trailing_space = usize::from(i + 1 < words.len());
            let len = char_len(word) + trailing_space;
            let end = word_clock + len as f64 * secs_per_char;
            timed.push(WordTiming {
                word: (*word).to_owned(),
                start: word_clock,
                end,
            });
            word_clock = end;
        }
        if let Some(last) = timed.last_mut() {
            last.end = chunk_end;
        }

        chunks.push(TimedScriptChunk {
            text,
            start: chunk_start,
            end: chunk_end,
            words: timed,
        });
        clock = chunk_end;
    }

    if let Some(last) = chunks.last_mut() {
        last.end = total_duration;
        if let Some(w) = last.words.last_mut() {
            w.end = total_duration;
        }
    }

    tracing::debug!(
        chunks = chunks.len(),
        total_chars,
        total_duration,
        "estimated subtitle timing"
    );
    Ok(chunks)
}

#[cfg(test)]
#[path = "../../tests/unit/timing/estimate.rs"]
mod tests;
