//! Typed view of the records produced by the catalog dumper.
//!
//! The dump is a JSON array: record 0 is catalog-wide metadata, every other record is an
//! entry discriminated by its `AssetType` key. Unknown kinds are rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::foundation::error::{RecomposeError, RecomposeResult};

/// Catalog-wide metadata (first record of the dump).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogMetadata {
    /// Target platform string, e.g. `macosx` or `macosx-ios`.
    #[serde(rename = "Platform", default)]
    pub platform: Option<String>,
    /// Remaining metadata keys, kept for audit.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One catalog entry, discriminated by `AssetType`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "AssetType")]
pub enum CatalogEntry {
    /// `IconImageStack`: per-appearance stack of groups plus a background declaration.
    #[serde(rename = "IconImageStack")]
    GroupContainer(GroupContainerEntry),
    /// `IconGroup`: per-appearance ordered list of layers.
    #[serde(rename = "IconGroup")]
    Group(GroupEntry),
    /// `Vector`: vector layer rendition.
    #[serde(rename = "Vector")]
    VectorLayer(RenditionEntry),
    /// `Image`: raster layer rendition.
    #[serde(rename = "Image")]
    ImageLayer(RenditionEntry),
    /// `Icon Image`: pre-rendered bitmap of the whole icon.
    #[serde(rename = "Icon Image")]
    LegacyBitmap(RenditionEntry),
    /// `MultiSized Image`: container that only groups legacy bitmaps.
    #[serde(rename = "MultiSized Image")]
    MultiSizedImage(NamedEntry),
    /// `Color`: named color.
    #[serde(rename = "Color")]
    Color(ColorEntry),
    /// `Named Gradient`: named gradient over color names.
    #[serde(rename = "Named Gradient")]
    Gradient(GradientEntry),
}

impl CatalogEntry {
    /// Entry name.
    pub fn name(&self) -> &str {
        match self {
            Self::GroupContainer(e) => &e.name,
            Self::Group(e) => &e.name,
            Self::VectorLayer(e) | Self::ImageLayer(e) | Self::LegacyBitmap(e) => &e.name,
            Self::MultiSizedImage(e) => &e.name,
            Self::Color(e) => &e.name,
            Self::Gradient(e) => &e.name,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NamedEntry {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GroupContainerEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Appearance", default)]
    pub appearance: Option<String>,
    #[serde(rename = "CanvasWidth", default)]
    pub canvas_width: Option<f64>,
    #[serde(rename = "CanvasHeight", default)]
    pub canvas_height: Option<f64>,
    #[serde(rename = "Layers", default)]
    pub members: Vec<StackMember>,
}

/// Member of a group container: either a group reference carrying group-level properties,
/// or (for any other kind) the stack's background declaration.
#[derive(Clone, Debug, Deserialize)]
pub struct StackMember {
    #[serde(rename = "AssetType")]
    pub asset_type: String,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "LayerOpacity", default)]
    pub opacity: Option<f64>,
    #[serde(rename = "LayerShadowStyle", default)]
    pub shadow_style: Option<i64>,
    #[serde(rename = "LayerShadowOpacity", default)]
    pub shadow_opacity: Option<f64>,
    #[serde(rename = "LayerTranslucency", default)]
    pub translucency: Option<f64>,
    #[serde(rename = "LayerBlurStrength", default)]
    pub blur_strength: Option<f64>,
    #[serde(rename = "LayerHasSpecular", default, deserialize_with = "de_flag")]
    pub has_specular: bool,
    #[serde(
        rename = "LayerGathersSpecularByElement",
        default,
        deserialize_with = "de_flag"
    )]
    pub gathers_specular: bool,
}

impl StackMember {
    /// `true` when this member references an `IconGroup`.
    pub fn is_group(&self) -> bool {
        self.asset_type == "IconGroup"
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GroupEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Appearance", default)]
    pub appearance: Option<String>,
    #[serde(rename = "Layers", default)]
    pub members: Vec<GroupMember>,
}

/// Layer listed inside an `IconGroup`, in compositing order.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "AssetType")]
pub enum GroupMember {
    #[serde(rename = "Vector")]
    Vector(LayerMember),
    #[serde(rename = "Image")]
    Image(LayerMember),
}

impl GroupMember {
    pub fn layer(&self) -> &LayerMember {
        match self {
            Self::Vector(m) | Self::Image(m) => m,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LayerMember {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "LayerGradientColorName", default)]
    pub fill_ref: Option<String>,
    #[serde(rename = "LayerOpacity", default)]
    pub opacity: Option<f64>,
    #[serde(rename = "LayerPosition", default)]
    pub position: Option<String>,
    #[serde(rename = "LayerSize", default)]
    pub size: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RenditionEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "RenditionName", default)]
    pub rendition_name: Option<String>,
    #[serde(rename = "Appearance", default)]
    pub appearance: Option<String>,
    #[serde(rename = "PixelWidth", default)]
    pub pixel_width: u32,
    #[serde(rename = "PixelHeight", default)]
    pub pixel_height: u32,
}

impl RenditionEntry {
    /// Rendition stem: `RenditionName` without its extension.
    pub fn stem(&self) -> Option<&str> {
        let rn = self.rendition_name.as_deref()?;
        let stem = match rn.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
            _ => rn,
        };
        (!stem.is_empty()).then_some(stem)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ColorEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Appearance", default)]
    pub appearance: Option<String>,
    #[serde(rename = "Color components")]
    pub components: Vec<f64>,
    #[serde(rename = "Colorspace", default)]
    pub colorspace: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GradientEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Appearance", default)]
    pub appearance: Option<String>,
    #[serde(rename = "Gradient Colors", default)]
    pub colors: Vec<String>,
    #[serde(rename = "Gradient Locations", default)]
    pub locations: Option<Vec<f64>>,
    #[serde(rename = "Gradient Start/Stop", default)]
    pub start_stop: Option<String>,
}

/// Catalog flags appear both as JSON booleans and as 0/1 integers.
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Num(f64),
    }

    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Repr::Bool(b)) => Ok(b),
        Some(Repr::Num(n)) => Ok(n != 0.0),
    }
}

/// Split a raw dump into its metadata record and typed entries.
pub fn parse_entries(
    raw: &[serde_json::Value],
) -> RecomposeResult<(CatalogMetadata, Vec<CatalogEntry>)> {
    let Some((first, rest)) = raw.split_first() else {
        return Err(RecomposeError::malformed("catalog is empty"));
    };
    if !first.is_object() {
        return Err(RecomposeError::malformed(
            "catalog record 0 must be the metadata object",
        ));
    }
    let metadata: CatalogMetadata = serde_json::from_value(first.clone())
        .map_err(|e| RecomposeError::malformed(format!("catalog metadata: {e}")))?;

    let mut entries = Vec::with_capacity(rest.len());
    for (i, value) in rest.iter().enumerate() {
        let entry: CatalogEntry = serde_json::from_value(value.clone()).map_err(|e| {
            let name = value
                .get("Name")
                .and_then(|n| n.as_str())
                .unwrap_or("<unnamed>");
            RecomposeError::malformed(format!("catalog record {} ('{name}'): {e}", i + 1))
        })?;
        entries.push(entry);
    }
    Ok((metadata, entries))
}

/// `true` when `name` belongs to the icon `icon_name`.
pub fn is_scoped(name: &str, icon_name: &str) -> bool {
    name == icon_name
        || name
            .strip_prefix(icon_name)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Keep the metadata record, every entry scoped to `icon_name`, and all colors and
/// gradients (those are dereferenced by name from anywhere).
pub fn filter_catalog(raw: &[serde_json::Value], icon_name: &str) -> Vec<serde_json::Value> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter();
    if let Some(meta) = iter.next() {
        out.push(meta.clone());
    }
    for value in iter {
        let kind = value.get("AssetType").and_then(|v| v.as_str());
        let name = value.get("Name").and_then(|v| v.as_str());
        let keep = matches!(kind, Some("Color") | Some("Named Gradient"))
            || name.is_some_and(|n| is_scoped(n, icon_name));
        if keep {
            out.push(value.clone());
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/entry.rs"]
mod tests;
