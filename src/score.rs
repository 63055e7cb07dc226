//! Visual fidelity score between a reference rendering and a rendering of the rebuilt icon.
//!
//! Both images are cropped to their opaque bounds, composited onto white and resized to
//! [`COMPARE_SIZE`] before three metrics are blended:
//!
//! | metric | weight | definition |
//! |---|---|---|
//! | color | [`WEIGHT_COLOR`] | `1 - rmse / MAX_RMSE` over RGB, clamped to `0..=1` |
//! | structure | [`WEIGHT_STRUCTURE`] | mean SSIM over [`SSIM_WINDOW`]-pixel luminance windows, clamped to `0..=1` |
//! | histogram | [`WEIGHT_HISTOGRAM`] | mean per-channel 256-bin histogram intersection |
//!
//! The total is the weighted sum scaled to `0..=100` and rounded half to even, as is the
//! white compositing. Every step is deterministic.

use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Edge of the square both images are compared at.
pub const COMPARE_SIZE: u32 = 256;
/// RMSE (out of 255) that maps to a color score of zero.
pub const MAX_RMSE: f64 = 80.0;
/// Edge of the non-overlapping SSIM windows.
pub const SSIM_WINDOW: u32 = 8;
/// `(0.01 * 255)^2`
pub const SSIM_C1: f64 = 6.5025;
/// `(0.03 * 255)^2`
pub const SSIM_C2: f64 = 58.5225;
pub const WEIGHT_COLOR: f64 = 0.50;
pub const WEIGHT_STRUCTURE: f64 = 0.40;
pub const WEIGHT_HISTOGRAM: f64 = 0.10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FidelityScore {
    pub color: f64,
    pub structure: f64,
    pub histogram: f64,
    /// Weighted blend, `0..=100`.
    pub total: u8,
}

/// Bounds of the pixels with non-zero alpha; the full image when every pixel is transparent.
pub fn opaque_bounds(img: &RgbaImage) -> (u32, u32, u32, u32) {
    let (w, h) = img.dimensions();
    let mut min_x = w;
    let mut min_y = h;
    let mut max_x = 0;
    let mut max_y = 0;
    for (x, y, px) in img.enumerate_pixels() {
        if px[3] > 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x > max_x || min_y > max_y {
        return (0, 0, w, h);
    }
    (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

fn on_white(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let a = f64::from(p[3]) / 255.0;
        let blend = |c: u8| (f64::from(c) * a + 255.0 * (1.0 - a)).round_ties_even() as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

/// Crop, composite onto white and resize to the comparison grid.
pub fn normalize(img: &RgbaImage) -> RgbImage {
    let (x, y, w, h) = opaque_bounds(img);
    let cropped = image::imageops::crop_imm(img, x, y, w, h).to_image();
    let flat = on_white(&cropped);
    image::imageops::resize(
        &flat,
        COMPARE_SIZE,
        COMPARE_SIZE,
        image::imageops::FilterType::Triangle,
    )
}

fn color_score(a: &RgbImage, b: &RgbImage) -> f64 {
    let n = a.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    let rmse = (sum_sq / n as f64).sqrt();
    (1.0 - rmse / MAX_RMSE).clamp(0.0, 1.0)
}

fn luminance(img: &RgbImage) -> Vec<f64> {
    img.pixels()
        .map(|p| 0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2]))
        .collect()
}

fn structure_score(a: &RgbImage, b: &RgbImage) -> f64 {
    let (w, h) = a.dimensions();
    let (la, lb) = (luminance(a), luminance(b));
    let win = SSIM_WINDOW;
    let n = f64::from(win * win);
    let mut sum = 0.0;
    let mut count = 0u32;
    for row in (0..h.saturating_sub(win - 1)).step_by(win as usize) {
        for col in (0..w.saturating_sub(win - 1)).step_by(win as usize) {
            let idx = |dx: u32, dy: u32| ((row + dy) * w + col + dx) as usize;
            let cells = || (0..win).flat_map(move |dy| (0..win).map(move |dx| idx(dx, dy)));
            let mu_a = cells().map(|i| la[i]).sum::<f64>() / n;
            let mu_b = cells().map(|i| lb[i]).sum::<f64>() / n;
            let var_a = cells().map(|i| (la[i] - mu_a).powi(2)).sum::<f64>() / n;
            let var_b = cells().map(|i| (lb[i] - mu_b).powi(2)).sum::<f64>() / n;
            let cov = cells().map(|i| (la[i] - mu_a) * (lb[i] - mu_b)).sum::<f64>() / n;
            let num = (2.0 * mu_a * mu_b + SSIM_C1) * (2.0 * cov + SSIM_C2);
            let den = (mu_a * mu_a + mu_b * mu_b + SSIM_C1) * (var_a + var_b + SSIM_C2);
            sum += num / den;
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum / f64::from(count)).clamp(0.0, 1.0)
}

fn histogram_score(a: &RgbImage, b: &RgbImage) -> f64 {
    let n = f64::from(a.width() * a.height());
    if n == 0.0 {
        return 0.0;
    }
    let mut total = 0.0;
    for ch in 0..3 {
        let mut ha = [0u32; 256];
        let mut hb = [0u32; 256];
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            ha[usize::from(pa[ch])] += 1;
            hb[usize::from(pb[ch])] += 1;
        }
        total += ha
            .iter()
            .zip(&hb)
            .map(|(x, y)| f64::from((*x).min(*y)) / n)
            .sum::<f64>();
    }
    total / 3.0
}

/// Final `0..=100` total of a blended score; ties go to the even integer.
fn rounded_total(blended: f64) -> u8 {
    blended.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Score `candidate` against `reference`.
pub fn score_images(reference: &RgbaImage, candidate: &RgbaImage) -> FidelityScore {
    let a = normalize(reference);
    let b = normalize(candidate);
    let color = color_score(&a, &b);
    let structure = structure_score(&a, &b);
    let histogram = histogram_score(&a, &b);
    let blended =
        100.0 * (WEIGHT_COLOR * color + WEIGHT_STRUCTURE * structure + WEIGHT_HISTOGRAM * histogram);
    FidelityScore {
        color,
        structure,
        histogram,
        total: rounded_total(blended),
    }
}

#[cfg(test)]
#[path = "../tests/unit/score/metrics.rs"]
mod tests;
