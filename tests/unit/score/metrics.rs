use super::*;
use image::Rgba;

fn square_on(canvas: u32, at: (u32, u32), edge: u32, color: [u8; 4]) -> RgbaImage {
    let mut img = RgbaImage::new(canvas, canvas);
    for y in at.1..at.1 + edge {
        for x in at.0..at.0 + edge {
            img.put_pixel(x, y, Rgba(color));
        }
    }
    img
}

fn gradient(edge: u32) -> RgbaImage {
    RgbaImage::from_fn(edge, edge, |x, y| {
        Rgba([(x * 255 / edge) as u8, (y * 255 / edge) as u8, 128, 255])
    })
}

#[test]
fn identical_images_score_full_marks() {
    let img = gradient(64);
    let score = score_images(&img, &img);
    assert_eq!(score.total, 100);
    assert_eq!(score.color, 1.0);
    assert_eq!(score.histogram, 1.0);
    assert!(score.structure > 0.9999);
}

#[test]
fn scoring_is_deterministic() {
    let a = gradient(80);
    let b = square_on(80, (10, 10), 50, [200, 40, 40, 255]);
    assert_eq!(score_images(&a, &b), score_images(&a, &b));
}

#[test]
fn transparent_margins_do_not_matter() {
    let a = square_on(40, (5, 5), 10, [255, 0, 0, 255]);
    let b = square_on(50, (20, 25), 10, [255, 0, 0, 255]);
    assert_eq!(score_images(&a, &b).total, 100);
}

#[test]
fn different_colors_score_low() {
    let red = RgbaImage::from_pixel(32, 32, Rgba([255, 0, 0, 255]));
    let blue = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 255]));
    let score = score_images(&red, &blue);
    assert_eq!(score.color, 0.0);
    assert!((score.histogram - 1.0 / 3.0).abs() < 1e-9);
    assert!(score.total < 50, "{score:?}");
    assert!(score.total > 0);
}

#[test]
fn bounds_cover_opaque_pixels_only() {
    let mut img = RgbaImage::new(10, 10);
    assert_eq!(opaque_bounds(&img), (0, 0, 10, 10));
    img.put_pixel(3, 4, Rgba([0, 0, 0, 1]));
    assert_eq!(opaque_bounds(&img), (3, 4, 1, 1));
    img.put_pixel(7, 8, Rgba([0, 0, 0, 255]));
    assert_eq!(opaque_bounds(&img), (3, 4, 5, 5));
}

#[test]
fn normalization_composites_onto_white() {
    let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 128]));
    let flat = normalize(&img);
    assert_eq!(flat.dimensions(), (COMPARE_SIZE, COMPARE_SIZE));
    let p = flat.get_pixel(128, 128);
    assert_eq!(p.0, [127, 127, 127]);
}

#[test]
fn totals_round_half_to_even() {
    assert_eq!(rounded_total(62.5), 62);
    assert_eq!(rounded_total(63.5), 64);
    assert_eq!(rounded_total(0.5), 0);
    assert_eq!(rounded_total(63.51), 64);
    assert_eq!(rounded_total(101.2), 100);
    assert_eq!(rounded_total(-4.0), 0);
}
