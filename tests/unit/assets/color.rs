use super::*;
use serde_json::json;

#[test]
fn parses_hex_forms() {
    let c: ColorRgba8 = serde_json::from_value(json!("#FFD700")).unwrap();
    assert_eq!(c, ColorRgba8::rgb(255, 215, 0));

    let c: ColorRgba8 = serde_json::from_value(json!("#fff")).unwrap();
    assert_eq!(c, ColorRgba8::WHITE);

    let c: ColorRgba8 = serde_json::from_value(json!("#0000ff80")).unwrap();
    assert_eq!(c, ColorRgba8::rgba(0, 0, 255, 128));
}

#[test]
fn parses_rgba_function() {
    let c = ColorRgba8::parse("rgba(0,0,0,0.6)").unwrap();
    assert_eq!(c, ColorRgba8::rgba(0, 0, 0, 153));

    let c = ColorRgba8::parse(" RGB(10, 20, 30) ").unwrap();
    assert_eq!(c, ColorRgba8::rgb(10, 20, 30));
}

#[test]
fn rejects_garbage() {
    assert!(ColorRgba8::parse("#12345").is_err());
    assert!(ColorRgba8::parse("rgba(1,2)").is_err());
    assert!(ColorRgba8::parse("chartreuse-ish").is_err());
    assert!(serde_json::from_value::<ColorRgba8>(json!("#zzzzzz")).is_err());
}

#[test]
fn serializes_as_hex_string() {
    let v = serde_json::to_value(ColorRgba8::rgba(0, 0, 0, 153)).unwrap();
    assert_eq!(v, json!("#00000099"));
    let v = serde_json::to_value(ColorRgba8::rgb(255, 215, 0)).unwrap();
    assert_eq!(v, json!("#FFD700"));
}

#[test]
fn opacity_scales_alpha_only() {
    let c = ColorRgba8::rgb(200, 100, 50).with_opacity(0.5);
    assert_eq!((c.r, c.g, c.b, c.a), (200, 100, 50, 128));
    let p = ColorRgba8::rgba(255, 255, 255, 0).to_rgba8_premul();
    assert_eq!(p, Rgba8Premul::transparent());
}
