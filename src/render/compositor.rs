use crate::{
    assets::{color::ColorRgba8, decode::PreparedImage},
    foundation::{
        core::{Affine, Canvas, Rect},
        error::{ReelError, ReelResult},
    },
    render::{
        backend::{FrameRGBA, ImagePaint, affine_to_cpu, canvas_u16, rect_to_cpu},
        subtitle::{SubtitleLayout, SubtitleLayoutCache, SubtitleLayoutOpts, SubtitleStyle},
        text::TextShaper,
    },
    timing::{
        estimate::TimedScriptChunk,
        timeline::{WordState, active_chunk, image_index_at, progress},
    },
};

/// Slow zoom and pan applied to every still.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KenBurns {
    /// Fixed zoom factor.
    pub scale: f64,
    /// Pan travel as a fraction of the frame size; the pan moves from `-range` to `+range`.
    pub pan_range: f64,
}

impl Default for KenBurns {
    fn default() -> Self {
        Self {
            scale: 1.2,
            pan_range: 0.08,
        }
    }
}

/// Where a still lands on the frame: the cover-fit source rectangle and the image-space to
/// frame-space transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImagePlacement {
    /// Cropped region of the source image, centred on its longer axis.
    pub source: Rect,
    /// Maps image pixels to frame pixels.
    pub transform: Affine,
}

/// Cover-fit crop plus Ken Burns motion at `progress` (0..1).
pub fn ken_burns_placement(
    image_w: u32,
    image_h: u32,
    canvas: Canvas,
    progress: f64,
    kb: KenBurns,
) -> ImagePlacement {
    let (iw, ih) = (f64::from(image_w), f64::from(image_h));
    let (w, h) = (f64::from(canvas.width), f64::from(canvas.height));
    let canvas_ratio = w / h;

    let source = if iw / ih > canvas_ratio {
        let sw = ih * canvas_ratio;
        Rect::new((iw - sw) / 2.0, 0.0, (iw + sw) / 2.0, ih)
    } else {
        let sh = iw / canvas_ratio;
        Rect::new(0.0, (ih - sh) / 2.0, iw, (ih + sh) / 2.0)
    };

    let pan = -kb.pan_range + 2.0 * kb.pan_range * progress.clamp(0.0, 1.0);
    let transform = Affine::translate((w / 2.0, h / 2.0))
        * Affine::scale(kb.scale)
        * Affine::translate((pan * w, pan * h))
        * Affine::translate((-w / 2.0, -h / 2.0))
        * Affine::scale_non_uniform(w / source.width(), h / source.height())
        * Affine::translate((-source.x0, -source.y0));

    ImagePlacement { source, transform }
}

/// Everything the compositor draws from, fixed for one render pass.
#[derive(Clone, Debug)]
pub struct ReelScene {
    /// Output size.
    pub canvas: Canvas,
    /// Narration duration in seconds.
    pub duration: f64,
    /// Timed subtitle chunks.
    pub chunks: Vec<TimedScriptChunk>,
    /// Subtitle look.
    pub style: SubtitleStyle,
}

/// Off-screen frame renderer used for export and still previews.
///
/// Every frame is a pure function of `elapsed`; nothing depends on how many frames were drawn
/// before, except the subtitle layout cache which only saves work.
pub struct ReelCompositor<S: TextShaper> {
    scene: ReelScene,
    images: Vec<Option<ImagePaint>>,
    shaper: S,
    ken_burns: KenBurns,
    layout_opts: SubtitleLayoutOpts,
    subtitle_cache: SubtitleLayoutCache,
    ctx: Option<vello_cpu::RenderContext>,
}

impl<S: TextShaper> std::fmt::Debug for ReelCompositor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReelCompositor")
            .field("canvas", &self.scene.canvas)
            .field("duration", &self.scene.duration)
            .field("chunks", &self.scene.chunks.len())
            .field("images", &self.images.len())
            .finish_non_exhaustive()
    }
}

impl<S: TextShaper> ReelCompositor<S> {
    /// Build a compositor. `images` holds one entry per timeline segment; `None` marks an image
    /// that failed to load and is skipped when its segment comes up.
    pub fn new(scene: ReelScene, images: &[Option<PreparedImage>], shaper: S) -> ReelResult<Self> {
        canvas_u16(scene.canvas)?;
        if !scene.duration.is_finite() || scene.duration < 0.0 {
            return Err(ReelError::validation("scene duration must be finite and >= 0"));
        }
        let images = images
            .iter()
            .enumerate()
            .map(|(i, img)| {
                let img = img.as_ref()?;
                match ImagePaint::from_prepared(img) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        tracing::warn!(index = i, error = %e, "image cannot be uploaded; skipping");
                        None
                    }
                }
            })
            .collect();
        Ok(Self {
            scene,
            images,
            shaper,
            ken_burns: KenBurns::default(),
            layout_opts: SubtitleLayoutOpts::default(),
            subtitle_cache: SubtitleLayoutCache::new(),
            ctx: None,
        })
    }

    /// Override the motion constants.
    pub fn with_ken_burns(mut self, kb: KenBurns) -> Self {
        self.ken_burns = kb;
        self
    }

    /// Override the subtitle geometry constants.
    pub fn with_layout_opts(mut self, opts: SubtitleLayoutOpts) -> Self {
        self.layout_opts = opts;
        self.subtitle_cache.clear();
        self
    }

    /// Scene being rendered.
    pub fn scene(&self) -> &ReelScene {
        &self.scene
    }

    /// Whether at least one image is drawable.
    pub fn has_any_image(&self) -> bool {
        self.images.iter().any(Option::is_some)
    }

    /// Subtitle layout cache, exposed for inspection.
    pub fn subtitle_cache(&self) -> &SubtitleLayoutCache {
        &self.subtitle_cache
    }

    /// Text shaper in use.
    pub fn shaper(&self) -> &S {
        &self.shaper
    }

    /// Render the frame at `elapsed` seconds from narration start.
    pub fn draw_frame(&mut self, elapsed: f64) -> ReelResult<FrameRGBA> {
        let (w, h) = canvas_u16(self.scene.canvas)?;
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();

        let out = self.paint(&mut ctx, elapsed);
        let frame = out.map(|()| {
            let mut pixmap = vello_cpu::Pixmap::new(w, h);
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            FrameRGBA {
                width: u32::from(w),
                height: u32::from(h),
                data: pixmap.data_as_u8_slice().to_vec(),
                premultiplied: true,
            }
        });
        self.ctx = Some(ctx);
        frame
    }

    fn paint(&mut self, ctx: &mut vello_cpu::RenderContext, elapsed: f64) -> ReelResult<()> {
        let canvas = self.scene.canvas;
        let frame_rect = Rect::new(0.0, 0.0, f64::from(canvas.width), f64::from(canvas.height));

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(ColorRgba8::BLACK.to_cpu());
        ctx.fill_rect(&rect_to_cpu(frame_rect));

        let image = image_index_at(elapsed, self.scene.duration, self.images.len())
            .and_then(|i| self.images.get(i))
            .and_then(Option::as_ref);
        if let Some(img) = image {
            let placement = ken_burns_placement(
                img.width,
                img.height,
                canvas,
                progress(elapsed, self.scene.duration),
                self.ken_burns,
            );
            ctx.set_transform(affine_to_cpu(placement.transform));
            ctx.set_paint(img.paint.clone());
            ctx.fill_rect(&rect_to_cpu(placement.source));
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        }

        let Some((index, chunk)) = active_chunk(&self.scene.chunks, elapsed)
            .filter(|(_, c)| !c.words.is_empty())
        else {
            self.subtitle_cache.clear();
            return Ok(());
        };

        let layout = self.subtitle_cache.get_or_layout(
            &mut self.shaper,
            index,
            chunk,
            &self.scene.style,
            canvas,
            &self.layout_opts,
        )?;
        draw_subtitle(
            ctx,
            &mut self.shaper,
            layout,
            chunk,
            &self.scene.style,
            &self.layout_opts,
            elapsed,
        )
    }
}

fn draw_subtitle<S: TextShaper + ?Sized>(
    ctx: &mut vello_cpu::RenderContext,
    shaper: &mut S,
    layout: &SubtitleLayout,
    chunk: &TimedScriptChunk,
    style: &SubtitleStyle,
    opts: &SubtitleLayoutOpts,
    elapsed: f64,
) -> ReelResult<()> {
    if style.bg_enabled {
        let pad = opts.bg_padding_px;
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(style.bg_color.to_cpu());
        for line in &layout.lines {
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                line.x - pad,
                line.y - pad / 2.0,
                line.x + line.width + pad,
                line.y + layout.line_height,
            ));
        }
    }

    let shadow = opts.shadow_offset_px;
    for line in &layout.lines {
        for (word, x) in chunk.words[line.words.clone()].iter().zip(&line.word_x) {
            let color = match WordState::at(word, elapsed) {
                WordState::Upcoming => continue,
                WordState::Current => style.active_color,
                WordState::Spoken => style.default_color,
            };
            if shadow != 0.0 {
                shaper.fill_text(
                    ctx,
                    &word.word,
                    x + shadow,
                    line.y + shadow,
                    &layout.font,
                    ColorRgba8::BLACK.with_opacity(f64::from(color.a) / 255.0),
                )?;
            }
            shaper.fill_text(ctx, &word.word, *x, line.y, &layout.font, color)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
