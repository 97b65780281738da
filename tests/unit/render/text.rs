use super::*;

fn system_font() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}

fn font(size_px: f64) -> FontSpec {
    FontSpec {
        family: "Arial, sans-serif".to_owned(),
        size_px,
    }
}

#[test]
fn block_shaper_measures_chars() {
    let mut s = BlockShaper::new();
    assert_eq!(s.measure("abcd", &font(10.0)).unwrap(), 24.0);
    assert_eq!(s.measure("ўз ", &font(10.0)).unwrap(), 18.0);
    assert_eq!(s.measure_calls(), 2);
}

#[test]
fn block_shaper_draws_inside_its_advance() {
    let mut s = BlockShaper::new();
    let mut ctx = vello_cpu::RenderContext::new(40, 20);
    s.fill_text(&mut ctx, "a b", 0.0, 0.0, &font(10.0), ColorRgba8::WHITE)
        .unwrap();
    let mut pm = vello_cpu::Pixmap::new(40, 20);
    ctx.flush();
    ctx.render_to_pixmap(&mut pm);
    let px = |x: usize, y: usize| pm.data_as_u8_slice()[(y * 40 + x) * 4 + 3];
    assert!(px(3, 5) > 0);
    assert_eq!(px(9, 5), 0);
    assert!(px(15, 5) > 0);
}

#[test]
fn parley_shaper_rejects_non_font_bytes() {
    assert!(ParleyShaper::new(b"not a font".to_vec()).is_err());
}

#[test]
fn parley_shaper_measures_monotonically() {
    let Some(bytes) = system_font() else {
        eprintln!("skipping: no system font available");
        return;
    };
    let mut s = ParleyShaper::new(bytes).unwrap();
    assert!(!s.family_name().trim().is_empty());
    let f = font(40.0);
    let short = s.measure("kun", &f).unwrap();
    let spaced = s.measure("kun ", &f).unwrap();
    let long = s.measure("kun edi", &f).unwrap();
    assert!(short > 0.0);
    assert!(spaced > short);
    assert!(long > spaced);
    assert!(s.measure("x", &font(0.0)).is_err());
}
