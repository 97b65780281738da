use std::sync::Arc;

use super::*;
use crate::render::text::BlockShaper;
use crate::timing::estimate::{TimingOpts, estimate};

const SMALL: Canvas = Canvas {
    width: 108,
    height: 192,
};

fn solid(r: u8, g: u8, b: u8) -> PreparedImage {
    PreparedImage {
        width: 4,
        height: 4,
        rgba8_premul: Arc::new([r, g, b, 255].repeat(16)),
    }
}

fn scene(lines: &[&str], duration: f64) -> ReelScene {
    ReelScene {
        canvas: SMALL,
        duration,
        chunks: estimate(lines, duration, &TimingOpts::default()).unwrap(),
        style: SubtitleStyle {
            font_size: 150.0,
            ..SubtitleStyle::default()
        },
    }
}

fn close(px: [u8; 4], want: [u8; 4]) -> bool {
    px.iter().zip(want).all(|(a, b)| a.abs_diff(b) <= 2)
}

#[test]
fn cover_fit_crops_wide_images_to_center() {
    let canvas = Canvas {
        width: 1080,
        height: 1920,
    };
    let p = ken_burns_placement(2000, 1000, canvas, 0.5, KenBurns::default());
    assert!((p.source.width() - 562.5).abs() < 1e-9);
    assert!((p.source.x0 - 718.75).abs() < 1e-9);
    assert_eq!(p.source.height(), 1000.0);
    let center = p.transform * kurbo::Point::new(1000.0, 500.0);
    assert!((center.x - 540.0).abs() < 1e-9);
    assert!((center.y - 960.0).abs() < 1e-9);
}

#[test]
fn cover_fit_crops_tall_images_vertically() {
    let p = ken_burns_placement(1000, 4000, SMALL, 0.0, KenBurns::default());
    assert_eq!(p.source.width(), 1000.0);
    assert!((p.source.height() - 1000.0 / 0.5625).abs() < 1e-9);
    assert!((p.source.y0 + p.source.y1 - 4000.0).abs() < 1e-9);
}

#[test]
fn pan_moves_linearly_across_progress() {
    let canvas = Canvas {
        width: 1080,
        height: 1920,
    };
    let kb = KenBurns::default();
    let at = |progress| {
        let p = ken_burns_placement(1080, 1920, canvas, progress, kb);
        p.transform * kurbo::Point::new(540.0, 960.0)
    };
    assert!((at(0.0).x - (540.0 - 1.2 * 0.08 * 1080.0)).abs() < 1e-9);
    assert!((at(1.0).y - (960.0 + 1.2 * 0.08 * 1920.0)).abs() < 1e-9);
    assert!((at(0.5).x - 540.0).abs() < 1e-9);
}

#[test]
fn draws_active_image_and_skips_failed_ones() {
    let images = vec![Some(solid(255, 0, 0)), None, Some(solid(0, 0, 255))];
    let mut c = ReelCompositor::new(scene(&[], 3.0), &images, BlockShaper::new()).unwrap();
    assert!(c.has_any_image());

    let f = c.draw_frame(0.5).unwrap();
    assert_eq!((f.width, f.height), (108, 192));
    assert!(f.premultiplied);
    assert!(close(f.pixel(54, 96).unwrap(), [255, 0, 0, 255]));

    let f = c.draw_frame(1.5).unwrap();
    assert!(close(f.pixel(54, 96).unwrap(), [0, 0, 0, 255]));

    let f = c.draw_frame(2.5).unwrap();
    assert!(close(f.pixel(54, 96).unwrap(), [0, 0, 255, 255]));
}

#[test]
fn words_follow_spoken_current_upcoming_states() {
    let mut c = ReelCompositor::new(scene(&["ab cd"], 2.0), &[], BlockShaper::new()).unwrap();

    let f = c.draw_frame(0.5).unwrap();
    assert!(close(f.pixel(20, 135).unwrap(), [255, 215, 0, 255]));
    assert!(f.pixel(70, 135).unwrap()[0] < 50);

    let f = c.draw_frame(1.5).unwrap();
    assert!(close(f.pixel(20, 135).unwrap(), [255, 255, 255, 255]));
    assert!(close(f.pixel(70, 135).unwrap(), [255, 215, 0, 255]));
}

#[test]
fn background_box_sits_behind_line() {
    let mut c = ReelCompositor::new(scene(&["ab cd"], 2.0), &[Some(solid(255, 255, 255))], BlockShaper::new())
        .unwrap();
    let f = c.draw_frame(0.5).unwrap();
    // Inside the padded box but left of the first glyph: white image darkened by the 60% box.
    let px = f.pixel(5, 130).unwrap();
    assert!(px[0] > 80 && px[0] < 120, "{px:?}");
    // Well above the subtitle block: untouched image.
    assert!(close(f.pixel(54, 20).unwrap(), [255, 255, 255, 255]));
}

#[test]
fn layout_is_cached_per_chunk_and_cleared_between() {
    let mut c = ReelCompositor::new(
        scene(&["one two three four", "five six"], 4.0),
        &[],
        BlockShaper::new(),
    )
    .unwrap();
    c.draw_frame(0.1).unwrap();
    let calls = c.shaper().measure_calls();
    c.draw_frame(0.2).unwrap();
    c.draw_frame(0.3).unwrap();
    assert_eq!(c.shaper().measure_calls(), calls);
    assert_eq!(c.subtitle_cache().recomputations(), 1);
    assert_eq!(c.subtitle_cache().cached_chunk(), Some(0));

    c.draw_frame(3.9).unwrap();
    assert_eq!(c.subtitle_cache().cached_chunk(), Some(1));
    assert_eq!(c.subtitle_cache().recomputations(), 2);

    c.draw_frame(4.2).unwrap();
    assert_eq!(c.subtitle_cache().cached_chunk(), None);
}

#[test]
fn frames_depend_only_on_elapsed() {
    let images = vec![Some(solid(10, 200, 30))];
    let mut a = ReelCompositor::new(scene(&["ab cd"], 2.0), &images, BlockShaper::new()).unwrap();
    let mut b = ReelCompositor::new(scene(&["ab cd"], 2.0), &images, BlockShaper::new()).unwrap();
    for t in [0.0, 0.4, 0.9, 1.3] {
        a.draw_frame(t).unwrap();
    }
    assert_eq!(a.draw_frame(1.7).unwrap().data, b.draw_frame(1.7).unwrap().data);
}

#[test]
fn rejects_bad_scene() {
    let mut s = scene(&[], 1.0);
    s.duration = f64::NAN;
    assert!(ReelCompositor::new(s, &[], BlockShaper::new()).is_err());
    let mut s = scene(&[], 1.0);
    s.canvas = Canvas {
        width: 0,
        height: 10,
    };
    assert!(ReelCompositor::new(s, &[], BlockShaper::new()).is_err());
}
