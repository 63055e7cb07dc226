use crate::foundation::error::{RecomposeError, RecomposeResult};

/// Input color space declared by a catalog `Color` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ColorSpace {
    /// Standard sRGB.
    Srgb,
    /// Extended-range sRGB (components may leave `0..=1`).
    ExtendedSrgb,
    /// Display P3, already in the target space.
    DisplayP3,
    /// Single-channel gray.
    Gray,
    /// Extended-range gray.
    ExtendedGray,
}

impl ColorSpace {
    /// Classify a catalog `Colorspace` string. `component_count == 2` always means gray.
    pub fn from_catalog(raw: &str, component_count: usize) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("gray") || component_count == 2 {
            if lower.contains("extended") {
                return Self::ExtendedGray;
            }
            return Self::Gray;
        }
        if lower.contains("srgb") {
            if lower.contains("extended") {
                return Self::ExtendedSrgb;
            }
            return Self::Srgb;
        }
        if lower.contains("p3") {
            return Self::DisplayP3;
        }
        // assetutil omits the space for plain sRGB colors
        Self::Srgb
    }

    /// `true` for single-channel spaces.
    pub fn is_gray(self) -> bool {
        matches!(self, Self::Gray | Self::ExtendedGray)
    }
}

/// A catalog color with its derived Display P3 value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Color {
    /// Declared input space.
    pub space: ColorSpace,
    /// `[r, g, b, a]` in the input space. Gray colors repeat the gray level in r/g/b.
    pub components: [f64; 4],
    /// `[r, g, b]` in Display P3, computed once at parse time.
    pub display_p3: [f64; 3],
}

impl Color {
    /// Build a color from catalog components (`[g, a]`, `[r, g, b]` or `[r, g, b, a]`).
    pub fn from_components(components: &[f64], colorspace: &str) -> RecomposeResult<Self> {
        if components.iter().any(|c| !c.is_finite()) {
            return Err(RecomposeError::malformed(
                "color components must be finite numbers",
            ));
        }
        let space = ColorSpace::from_catalog(colorspace, components.len());
        let components = match (space.is_gray(), components) {
            (true, [g]) => [*g, *g, *g, 1.0],
            (true, [g, a, ..]) => [*g, *g, *g, *a],
            (false, [r, g, b]) => [*r, *g, *b, 1.0],
            (false, [r, g, b, a, ..]) => [*r, *g, *b, *a],
            _ => {
                return Err(RecomposeError::malformed(format!(
                    "color in '{colorspace}' has {} component(s)",
                    components.len()
                )));
            }
        };
        let [r, g, b, _] = components;
        let display_p3 = match space {
            ColorSpace::Srgb | ColorSpace::ExtendedSrgb => {
                let (pr, pg, pb) = srgb_to_display_p3(r, g, b);
                [pr, pg, pb]
            }
            ColorSpace::DisplayP3 | ColorSpace::Gray | ColorSpace::ExtendedGray => [r, g, b],
        };
        Ok(Self {
            space,
            components,
            display_p3,
        })
    }

    /// Alpha component.
    pub fn alpha(&self) -> f64 {
        self.components[3]
    }

    /// Document color string: `display-p3:r,g,b,a` or `extended-gray:g,a`, 5 decimals.
    pub fn to_document_string(&self) -> String {
        let a = self.alpha();
        if self.space.is_gray() {
            return format!("extended-gray:{:.5},{:.5}", self.components[0], a);
        }
        let [r, g, b] = self.display_p3;
        format!("display-p3:{r:.5},{g:.5},{b:.5},{a:.5}")
    }
}

/// A color parsed back out of a document color string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DocumentColor {
    /// Red (Display P3, or gray level).
    pub r: f64,
    /// Green (Display P3, or gray level).
    pub g: f64,
    /// Blue (Display P3, or gray level).
    pub b: f64,
    /// Alpha.
    pub a: f64,
    /// `true` for `extended-gray:` colors.
    pub gray: bool,
}

impl DocumentColor {
    /// Parse `display-p3:r,g,b,a` or `extended-gray:g,a`.
    pub fn parse(s: &str) -> RecomposeResult<Self> {
        let bad = || RecomposeError::malformed(format!("invalid document color \"{s}\""));
        let (prefix, rest) = s.split_once(':').ok_or_else(bad)?;
        let parts = rest
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| bad())?;
        match (prefix, parts.as_slice()) {
            ("extended-gray", [g]) => Ok(Self::gray(*g, 1.0)),
            ("extended-gray", [g, a]) => Ok(Self::gray(*g, *a)),
            ("display-p3", [r, g, b]) => Ok(Self::p3(*r, *g, *b, 1.0)),
            ("display-p3", [r, g, b, a]) => Ok(Self::p3(*r, *g, *b, *a)),
            _ => Err(bad()),
        }
    }

    fn gray(g: f64, a: f64) -> Self {
        Self {
            r: g,
            g,
            b: g,
            a,
            gray: true,
        }
    }

    fn p3(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r,
            g,
            b,
            a,
            gray: false,
        }
    }

    /// sRGB 8-bit channels (P3 colors converted back, clamped).
    pub fn to_srgb8(self) -> [u8; 3] {
        let (r, g, b) = if self.gray {
            (self.r, self.g, self.b)
        } else {
            display_p3_to_srgb(self.r, self.g, self.b)
        };
        let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [to_u8(r), to_u8(g), to_u8(b)]
    }
}

fn linearize(v: f64) -> f64 {
    let sign = if v >= 0.0 { 1.0 } else { -1.0 };
    let v = v.abs();
    if v <= 0.04045 {
        return sign * v / 12.92;
    }
    sign * ((v + 0.055) / 1.055).powf(2.4)
}

fn gamma_encode(v: f64) -> f64 {
    let sign = if v >= 0.0 { 1.0 } else { -1.0 };
    let v = v.abs();
    if v <= 0.0031308 {
        return sign * v * 12.92;
    }
    sign * (1.055 * v.powf(1.0 / 2.4) - 0.055)
}

/// Convert sRGB components to Display P3 through CIE XYZ (D65).
///
/// Both spaces share the sRGB transfer curve; only the primaries differ. Extended-range
/// inputs keep their sign through the curve.
pub fn srgb_to_display_p3(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let (rl, gl, bl) = (linearize(r), linearize(g), linearize(b));

    let x = 0.4123908 * rl + 0.3575843 * gl + 0.1804808 * bl;
    let y = 0.2126390 * rl + 0.7151687 * gl + 0.0721923 * bl;
    let z = 0.0193308 * rl + 0.1191948 * gl + 0.9505322 * bl;

    let pr = 2.4934969 * x - 0.9313836 * y - 0.4027108 * z;
    let pg = -0.8294890 * x + 1.7626641 * y + 0.0236247 * z;
    let pb = 0.0358458 * x - 0.0761724 * y + 0.9568845 * z;

    (gamma_encode(pr), gamma_encode(pg), gamma_encode(pb))
}

/// Inverse of [`srgb_to_display_p3`], clamped to `0..=1`.
pub fn display_p3_to_srgb(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let (rl, gl, bl) = (linearize(r), linearize(g), linearize(b));

    let x = 0.4865709 * rl + 0.2656677 * gl + 0.1982173 * bl;
    let y = 0.2289746 * rl + 0.6917385 * gl + 0.0792869 * bl;
    let z = 0.0451134 * gl + 1.0439444 * bl;

    let sr = 3.2404542 * x - 1.5371385 * y - 0.4985314 * z;
    let sg = -0.9692660 * x + 1.8760108 * y + 0.0415560 * z;
    let sb = 0.0556434 * x - 0.2040260 * y + 1.0572252 * z;

    (
        gamma_encode(sr).clamp(0.0, 1.0),
        gamma_encode(sg).clamp(0.0, 1.0),
        gamma_encode(sb).clamp(0.0, 1.0),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/color.rs"]
mod tests;
