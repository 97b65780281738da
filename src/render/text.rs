use std::borrow::Cow;
use std::collections::HashMap;

use crate::{
    assets::color::ColorRgba8,
    foundation::error::{ReelError, ReelResult},
};

const LAYOUT_CACHE_LIMIT: usize = 1024;

/// Font request: a CSS-like family list and a pixel size.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Family list, e.g. `Arial, sans-serif`.
    pub family: String,
    /// Size in pixels.
    pub size_px: f64,
}

/// Text measurement and drawing, the only text services the compositor needs.
pub trait TextShaper {
    /// Advance width of `text` in pixels, trailing whitespace included.
    fn measure(&mut self, text: &str, font: &FontSpec) -> ReelResult<f64>;

    /// Draw `text` with its line box's top-left corner at `(x, top)`.
    fn fill_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f64,
        top: f64,
        font: &FontSpec,
        color: ColorRgba8,
    ) -> ReelResult<()>;
}

impl<T: TextShaper + ?Sized> TextShaper for Box<T> {
    fn measure(&mut self, text: &str, font: &FontSpec) -> ReelResult<f64> {
        (**self).measure(text, font)
    }

    fn fill_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f64,
        top: f64,
        font: &FontSpec,
        color: ColorRgba8,
    ) -> ReelResult<()> {
        (**self).fill_text(ctx, text, x, top, font, color)
    }
}

/// [`TextShaper`] that shapes with Parley against one registered font file.
///
/// The requested family list is tried first; the registered face is always appended as the final
/// fallback so text never disappears for lack of a system font.
pub struct ParleyShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
    layouts: HashMap<(String, String, u64), parley::Layout<()>>,
}

impl std::fmt::Debug for ParleyShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParleyShaper")
            .field("family_name", &self.family_name)
            .field("cached_layouts", &self.layouts.len())
            .finish()
    }
}

impl ParleyShaper {
    /// Register `font_bytes` (TTF/OTF) and build a shaper around it.
    pub fn new(font_bytes: Vec<u8>) -> ReelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| ReelError::validation("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| ReelError::validation("registered font family has no name"))?
            .to_string();

        tracing::debug!(family = %family_name, "font registered");
        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
            layouts: HashMap::new(),
        })
    }

    /// Read a font file from disk.
    pub fn from_path(path: &std::path::Path) -> ReelResult<Self> {
        use anyhow::Context;
        let bytes = std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        Self::new(bytes)
    }

    /// Family name of the registered face.
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    fn layout(&mut self, text: &str, font: &FontSpec) -> ReelResult<&parley::Layout<()>> {
        if !font.size_px.is_finite() || font.size_px <= 0.0 {
            return Err(ReelError::validation("font size must be finite and > 0"));
        }
        let key = (text.to_owned(), font.family.clone(), font.size_px.to_bits());
        if !self.layouts.contains_key(&key) {
            if self.layouts.len() >= LAYOUT_CACHE_LIMIT {
                self.layouts.clear();
            }
            let stack = format!("{}, \"{}\"", font.family, self.family_name);
            let mut builder = self
                .layout_ctx
                .ranged_builder(&mut self.font_ctx, text, 1.0, true);
            builder.push_default(parley::style::StyleProperty::FontStack(
                parley::style::FontStack::Source(Cow::Owned(stack)),
            ));
            builder.push_default(parley::style::StyleProperty::FontSize(font.size_px as f32));
            let mut layout: parley::Layout<()> = builder.build(text);
            layout.break_all_lines(None);
            self.layouts.insert(key.clone(), layout);
        }
        self.layouts
            .get(&key)
            .ok_or_else(|| ReelError::validation("text layout cache miss"))
    }
}

impl TextShaper for ParleyShaper {
    fn measure(&mut self, text: &str, font: &FontSpec) -> ReelResult<f64> {
        Ok(f64::from(self.layout(text, font)?.full_width()))
    }

    fn fill_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f64,
        top: f64,
        font: &FontSpec,
        color: ColorRgba8,
    ) -> ReelResult<()> {
        let font_data = self.font.clone();
        let layout = self.layout(text, font)?;
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, top)));
        ctx.set_paint(color.to_cpu());
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let mut pen_x = run.offset();
                let baseline = run.baseline();
                let glyphs = run.glyphs().map(|g| {
                    let glyph = vello_cpu::Glyph {
                        id: g.id,
                        x: pen_x + g.x,
                        y: baseline - g.y,
                    };
                    pen_x += g.advance;
                    glyph
                });
                ctx.glyph_run(&font_data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }
}

/// Deterministic font-less shaper: every character advances `0.6 * size` and non-space
/// characters are drawn as solid blocks.
///
/// Used when no font file is configured and in tests. Counts measurements so callers can check
/// caching behaviour.
#[derive(Debug, Default)]
pub struct BlockShaper {
    measure_calls: u64,
}

impl BlockShaper {
    /// Advance of one character relative to the font size.
    pub const ADVANCE_EM: f64 = 0.6;

    /// New shaper with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`TextShaper::measure`] calls served so far.
    pub fn measure_calls(&self) -> u64 {
        self.measure_calls
    }
}

impl TextShaper for BlockShaper {
    fn measure(&mut self, text: &str, font: &FontSpec) -> ReelResult<f64> {
        self.measure_calls += 1;
        Ok(text.chars().count() as f64 * font.size_px * Self::ADVANCE_EM)
    }

    fn fill_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        x: f64,
        top: f64,
        font: &FontSpec,
        color: ColorRgba8,
    ) -> ReelResult<()> {
        let advance = font.size_px * Self::ADVANCE_EM;
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(color.to_cpu());
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x0 = x + i as f64 * advance;
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                x0 + advance * 0.1,
                top + font.size_px * 0.15,
                x0 + advance * 0.9,
                top + font.size_px * 0.85,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
