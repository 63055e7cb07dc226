//! Serde model of the Icon Composer `icon.json` document.

use serde::{Deserialize, Serialize};

use crate::catalog::model::Orientation as CatalogOrientation;
use crate::foundation::core::Appearance;

/// Root of `icon.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IconDocument {
    pub fill: Fill,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_specializations: Vec<Specialization<Fill>>,
    pub groups: Vec<Group>,
    pub supported_platforms: SupportedPlatforms,
}

impl IconDocument {
    /// Every `image-name` referenced by a layer.
    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| &g.layers)
            .map(|l| l.image_name.as_str())
    }

    pub fn layer_count(&self) -> usize {
        self.groups.iter().map(|g| g.layers.len()).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A fill. Every field is optional so a specialization can carry only what differs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Fill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_gradient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_gradient: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
}

impl Fill {
    pub fn automatic(color: String) -> Self {
        Self {
            automatic_gradient: Some(color),
            ..Self::default()
        }
    }

    pub fn linear(colors: Vec<String>, orientation: Option<Orientation>) -> Self {
        Self {
            linear_gradient: Some(colors),
            orientation,
            ..Self::default()
        }
    }

    /// Fields of `other` that differ from `self`; `None` when nothing differs.
    pub fn diff(&self, other: &Fill) -> Option<Fill> {
        fn pick<T: Clone + PartialEq>(a: &Option<T>, b: &Option<T>) -> Option<T> {
            if a != b { b.clone() } else { None }
        }
        let out = Fill {
            automatic_gradient: pick(&self.automatic_gradient, &other.automatic_gradient),
            linear_gradient: pick(&self.linear_gradient, &other.linear_gradient),
            orientation: pick(&self.orientation, &other.orientation),
        };
        (out != Fill::default()).then_some(out)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub start: Xy,
    pub stop: Xy,
}

impl From<CatalogOrientation> for Orientation {
    fn from(o: CatalogOrientation) -> Self {
        Self {
            start: Xy {
                x: o.start.x,
                y: o.start.y,
            },
            stop: Xy {
                x: o.stop.x,
                y: o.stop.y,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

/// Appearance-scoped override of a property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Specialization<T> {
    pub appearance: Appearance,
    pub value: T,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_material: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<Lighting>,
    pub shadow: Shadow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specular: Option<bool>,
    pub translucency: Translucency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opacity_specializations: Vec<Specialization<f64>>,
}

impl Group {
    /// `false` only when the group explicitly turns specular off.
    pub fn has_specular(&self) -> bool {
        self.specular.unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lighting {
    Individual,
    Combined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShadowKind {
    None,
    Neutral,
    LayerColor,
    /// Catalog style with no confirmed document equivalent.
    Unconfirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Shadow {
    pub kind: ShadowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_style: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Translucency {
    pub enabled: bool,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Layer {
    pub name: String,
    pub image_name: String,
    #[serde(default)]
    pub glass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fill_specializations: Vec<Specialization<Fill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opacity_specializations: Vec<Specialization<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportedPlatforms {
    pub squares: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circles: Option<Vec<String>>,
}

#[cfg(test)]
#[path = "../../tests/unit/document/model.rs"]
mod tests;
