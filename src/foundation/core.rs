use crate::foundation::error::{RecomposeError, RecomposeResult};

pub use kurbo::{Point, Rect, Size, Vec2};

/// Values within this distance are treated as equal when comparing opacities.
pub const OPACITY_EPSILON: f64 = 0.001;

/// Canvas dimensions in points (1x pixels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Canvas used when the catalog declares nothing usable.
    pub const DEFAULT: Canvas = Canvas {
        width: 1024,
        height: 1024,
    };

    /// Full-canvas rectangle anchored at the origin.
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Rendering context that may override baseline properties.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    /// Baseline appearance, always present.
    Light,
    /// Dark mode override.
    Dark,
    /// Tinted (monochrome) override.
    Tinted,
}

impl Appearance {
    /// Appearances that can carry overrides, in emission order.
    pub const OVERRIDES: [Appearance; 2] = [Appearance::Dark, Appearance::Tinted];

    /// Map a catalog appearance string. Unknown and absent strings are the baseline.
    pub fn from_catalog(raw: Option<&str>) -> Self {
        match raw {
            Some("UIAppearanceDark") | Some("NSAppearanceNameDarkAqua") => Self::Dark,
            Some("ISAppearanceTintable") => Self::Tinted,
            _ => Self::Light,
        }
    }

    /// Document-side name of the appearance.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Tinted => "tinted",
        }
    }
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One baseline value plus optional per-appearance overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct AppearanceValues<T> {
    /// Light (baseline) value.
    pub light: T,
    /// Dark override, if the catalog carried one.
    pub dark: Option<T>,
    /// Tinted override, if the catalog carried one.
    pub tinted: Option<T>,
}

impl<T> AppearanceValues<T> {
    /// Values with only a baseline.
    pub fn baseline(light: T) -> Self {
        Self {
            light,
            dark: None,
            tinted: None,
        }
    }

    /// Override slot for `appearance`, `None` for the baseline.
    pub fn override_for(&self, appearance: Appearance) -> Option<&T> {
        match appearance {
            Appearance::Light => None,
            Appearance::Dark => self.dark.as_ref(),
            Appearance::Tinted => self.tinted.as_ref(),
        }
    }

    /// Value in effect for `appearance`: the override if present, else the baseline.
    pub fn resolved(&self, appearance: Appearance) -> &T {
        self.override_for(appearance).unwrap_or(&self.light)
    }

    /// Store `value` for `appearance`. Returns `false` when that slot was already set.
    pub fn set_override(&mut self, appearance: Appearance, value: T) -> bool {
        let slot = match appearance {
            Appearance::Light => return false,
            Appearance::Dark => &mut self.dark,
            Appearance::Tinted => &mut self.tinted,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }
}

/// Parse a catalog `"x,y"` pair.
pub fn parse_pair(raw: &str) -> RecomposeResult<(f64, f64)> {
    let mut parts = raw.split(',').map(str::trim);
    let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RecomposeError::malformed(format!(
            "expected an \"x,y\" pair, got \"{raw}\""
        )));
    };
    let parse = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RecomposeError::malformed(format!("invalid number \"{s}\" in \"{raw}\"")))
    };
    Ok((parse(a)?, parse(b)?))
}

/// Layer geometry from catalog `LayerPosition` (top-left offset) and `LayerSize`.
pub fn parse_geometry(position: Option<&str>, size: Option<&str>) -> RecomposeResult<Option<Rect>> {
    let Some(size) = size else {
        return Ok(None);
    };
    let (w, h) = parse_pair(size)?;
    if w <= 0.0 || h <= 0.0 {
        return Err(RecomposeError::malformed(format!(
            "layer size must be positive, got \"{size}\""
        )));
    }
    let (x, y) = match position {
        Some(p) => parse_pair(p)?,
        None => (0.0, 0.0),
    };
    Ok(Some(Rect::from_origin_size(Point::new(x, y), Size::new(w, h))))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
