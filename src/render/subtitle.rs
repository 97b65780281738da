//! Subtitle styling, greedy line wrapping and the per-chunk layout cache.

use serde::{Deserialize, Serialize};

use crate::{
    assets::color::ColorRgba8,
    foundation::{core::Canvas, error::ReelResult},
    render::text::{FontSpec, TextShaper},
    timing::estimate::TimedScriptChunk,
};

/// User-adjustable subtitle look. Immutable for the duration of one render pass.
///
/// Serialized with camelCase keys (`fontFamily`, `fontSize`, ...); snake_case keys are accepted
/// on input. Unknown keys are rejected so a misspelt field never falls back to its default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SubtitleStyle {
    /// CSS-like family list.
    #[serde(alias = "font_family")]
    pub font_family: String,
    /// Nominal size; scaled to the output width when rendering. `<= 0` means unset.
    #[serde(alias = "font_size")]
    pub font_size: f64,
    /// Colour of the word being spoken.
    #[serde(alias = "active_color")]
    pub active_color: ColorRgba8,
    /// Colour of words already spoken.
    #[serde(alias = "default_color")]
    pub default_color: ColorRgba8,
    /// Draw a box behind each subtitle line.
    #[serde(alias = "bg_enabled")]
    pub bg_enabled: bool,
    /// Colour of that box.
    #[serde(alias = "bg_color")]
    pub bg_color: ColorRgba8,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial, sans-serif".to_owned(),
            font_size: 36.0,
            active_color: ColorRgba8::rgb(0xFF, 0xD7, 0x00),
            default_color: ColorRgba8::WHITE,
            bg_enabled: true,
            bg_color: ColorRgba8::rgba(0, 0, 0, 153),
        }
    }
}

/// Geometry constants of the subtitle block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubtitleLayoutOpts {
    /// Output-pixel size used when the style leaves the size unset.
    pub fallback_font_px: f64,
    /// Added to the font size to get the line height.
    pub line_gap_px: f64,
    /// Maximum line width as a fraction of the frame width.
    pub max_width_frac: f64,
    /// Vertical centre of the block as a fraction of the frame height.
    pub center_y_frac: f64,
    /// Background box padding.
    pub bg_padding_px: f64,
    /// Drop shadow offset (x and y).
    pub shadow_offset_px: f64,
}

impl Default for SubtitleLayoutOpts {
    fn default() -> Self {
        Self {
            fallback_font_px: 70.0,
            line_gap_px: 10.0,
            max_width_frac: 0.9,
            center_y_frac: 0.75,
            bg_padding_px: 12.0,
            shadow_offset_px: 3.0,
        }
    }
}

/// Output-pixel font size: the nominal size scaled from a 1080 px wide reference, times 1.8.
pub fn scaled_font_px(style: &SubtitleStyle, canvas: Canvas, opts: &SubtitleLayoutOpts) -> f64 {
    if style.font_size > 0.0 && style.font_size.is_finite() {
        (style.font_size * (f64::from(canvas.width) / 1080.0) * 1.8).round()
    } else {
        opts.fallback_font_px
    }
}

/// One wrapped line of a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleLine {
    /// Indices into the chunk's `words`.
    pub words: std::ops::Range<usize>,
    /// Measured width of the line's joined text.
    pub width: f64,
    /// Left edge of the first word.
    pub x: f64,
    /// Top of the line box.
    pub y: f64,
    /// Left edge of every word of the line, from cumulative `word + " "` advances.
    pub word_x: Vec<f64>,
}

/// Full wrap result for one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleLayout {
    /// Index of the chunk this layout belongs to.
    pub chunk_index: usize,
    /// Font used for measuring and drawing.
    pub font: FontSpec,
    /// Line height in pixels.
    pub line_height: f64,
    /// Wrapped lines, top to bottom.
    pub lines: Vec<SubtitleLine>,
}

/// Greedy word wrap of `chunk` against `max_width_frac` of the frame width, measuring real text.
pub fn layout_subtitle<S: TextShaper + ?Sized>(
    shaper: &mut S,
    chunk_index: usize,
    chunk: &TimedScriptChunk,
    style: &SubtitleStyle,
    canvas: Canvas,
    opts: &SubtitleLayoutOpts,
) -> ReelResult<SubtitleLayout> {
    let font = FontSpec {
        family: style.font_family.clone(),
        size_px: scaled_font_px(style, canvas, opts),
    };
    let line_height = font.size_px + opts.line_gap_px;
    let frame_w = f64::from(canvas.width);
    let max_width = frame_w * opts.max_width_frac;

    let mut ranges = Vec::new();
    let mut line_start = 0usize;
    let mut line_text = String::new();
    for (i, w) in chunk.words.iter().enumerate() {
        let candidate = if line_text.is_empty() {
            w.word.clone()
        } else {
            format!("{line_text} {}", w.word)
        };
        if i > line_start && shaper.measure(&candidate, &font)? > max_width {
            ranges.push(line_start..i);
            line_start = i;
            line_text = w.word.clone();
        } else {
            line_text = candidate;
        }
    }
    if line_start < chunk.words.len() {
        ranges.push(line_start..chunk.words.len());
    }

    let block_h = ranges.len() as f64 * line_height;
    let block_top = f64::from(canvas.height) * opts.center_y_frac - block_h / 2.0;

    let mut lines = Vec::with_capacity(ranges.len());
    for (li, range) in ranges.into_iter().enumerate() {
        let words = &chunk.words[range.clone()];
        let text = words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let width = shaper.measure(&text, &font)?;
        let x = (frame_w - width) / 2.0;
        let mut word_x = Vec::with_capacity(words.len());
        let mut pen = x;
        for w in words {
            word_x.push(pen);
            pen += shaper.measure(&format!("{} ", w.word), &font)?;
        }
        lines.push(SubtitleLine {
            words: range,
            width,
            x,
            y: block_top + li as f64 * line_height,
            word_x,
        });
    }

    Ok(SubtitleLayout {
        chunk_index,
        font,
        line_height,
        lines,
    })
}

/// Layout cache keyed by chunk index. Text metrics are only recomputed when the active chunk
/// changes.
#[derive(Debug, Default)]
pub struct SubtitleLayoutCache {
    current: Option<SubtitleLayout>,
    recomputations: u64,
}

impl SubtitleLayoutCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout for `chunk_index`, computing it only on a key change.
    pub fn get_or_layout<S: TextShaper + ?Sized>(
        &mut self,
        shaper: &mut S,
        chunk_index: usize,
        chunk: &TimedScriptChunk,
        style: &SubtitleStyle,
        canvas: Canvas,
        opts: &SubtitleLayoutOpts,
    ) -> ReelResult<&SubtitleLayout> {
        let layout = match self.current.take() {
            Some(l) if l.chunk_index == chunk_index => l,
            _ => {
                self.recomputations += 1;
                layout_subtitle(shaper, chunk_index, chunk, style, canvas, opts)?
            }
        };
        let layout: &SubtitleLayout = self.current.insert(layout);
        Ok(layout)
    }

    /// Drop the cached layout.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Chunk index of the cached layout, if any.
    pub fn cached_chunk(&self) -> Option<usize> {
        self.current.as_ref().map(|l| l.chunk_index)
    }

    /// How many layouts have been computed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/subtitle.rs"]
mod tests;
