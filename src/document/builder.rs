use std::collections::BTreeSet;

use crate::assets::resolver::{ResolvedAssets, ResolvedGroup};
use crate::catalog::entry::is_scoped;
use crate::catalog::model::{
    CatalogModel, FillTarget, GroupSpec, LayerSpec, Orientation as CatalogOrientation,
    Shadow as CatalogShadow,
};
use crate::document::model::{
    Fill, Group, IconDocument, Layer, Lighting, Shadow, ShadowKind, Specialization,
    SupportedPlatforms, Translucency,
};
use crate::foundation::core::{Appearance, AppearanceValues, OPACITY_EPSILON};
use crate::foundation::error::{RecomposeError, RecomposeResult};

/// Root fill of a legacy icon with no scoped colors.
pub const MID_GRAY: &str = "display-p3:0.50000,0.50000,0.50000,1.00000";

/// Document fill for a color or gradient reference, resolved under `appearance`.
///
/// A color becomes a two-stop gradient of itself; a single-stop gradient is duplicated.
pub fn layer_fill(model: &CatalogModel, name: &str, appearance: Appearance) -> Option<Fill> {
    match model.fill_target(name)? {
        FillTarget::Color(color) => {
            let c = color.resolved(appearance).to_document_string();
            Some(Fill::linear(
                vec![c.clone(), c],
                Some(CatalogOrientation::SOLID_FILL.into()),
            ))
        }
        FillTarget::Gradient(_) => gradient_fill(model, name, appearance),
    }
}

fn gradient_fill(model: &CatalogModel, name: &str, appearance: Appearance) -> Option<Fill> {
    let gradient = model.resolve_gradient(name, appearance)?;
    let mut colors: Vec<String> = gradient
        .stops
        .iter()
        .map(|(_, c)| c.to_document_string())
        .collect();
    if let [only] = colors.as_slice() {
        colors.push(only.clone());
    }
    Some(Fill::linear(colors, gradient.orientation.map(Into::into)))
}

fn rounded(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

/// Baseline opacity (only when not 1) plus one specialization per differing appearance.
fn opacity_fields(values: &AppearanceValues<f64>) -> (Option<f64>, Vec<Specialization<f64>>) {
    let base = values.light;
    let baseline = ((base - 1.0).abs() > OPACITY_EPSILON).then_some(base);
    let specs = Appearance::OVERRIDES
        .into_iter()
        .filter_map(|appearance| {
            let v = *values.resolved(appearance);
            ((v - base).abs() > OPACITY_EPSILON).then_some(Specialization {
                appearance,
                value: v,
            })
        })
        .collect();
    (baseline, specs)
}

fn fill_under(model: &CatalogModel, layer: &LayerSpec, appearance: Appearance) -> Option<Fill> {
    layer
        .fill
        .resolved(appearance)
        .as_deref()
        .and_then(|name| layer_fill(model, name, appearance))
}

/// `true` when the layer's fill or opacity resolves differently under some non-Light
/// appearance, whether through a layer override or through a color or gradient variant.
pub fn varies_by_appearance(model: &CatalogModel, layer: &LayerSpec) -> bool {
    let light = fill_under(model, layer, Appearance::Light);
    Appearance::OVERRIDES.into_iter().any(|appearance| {
        fill_under(model, layer, appearance) != light
            || (layer.opacity.resolved(appearance) - layer.opacity.light).abs() > OPACITY_EPSILON
    })
}

fn build_layer(model: &CatalogModel, group: &GroupSpec, layer: &LayerSpec, file: &str) -> Layer {
    let fill = fill_under(model, layer, Appearance::Light);
    let fill_specializations = Appearance::OVERRIDES
        .into_iter()
        .filter_map(|appearance| {
            let value = fill_under(model, layer, appearance)?;
            (Some(&value) != fill.as_ref()).then_some(Specialization { appearance, value })
        })
        .collect();
    let (opacity, opacity_specializations) = opacity_fields(&layer.opacity);
    Layer {
        name: layer.display_name.clone(),
        image_name: file.to_owned(),
        glass: group.specular,
        fill,
        fill_specializations,
        opacity,
        opacity_specializations,
    }
}

fn document_shadow(shadow: CatalogShadow) -> Shadow {
    let (kind, opacity, catalog_style) = match shadow {
        CatalogShadow::None => (ShadowKind::None, None, None),
        CatalogShadow::Neutral { opacity } => (ShadowKind::Neutral, Some(opacity), None),
        CatalogShadow::Chromatic { opacity } => (ShadowKind::LayerColor, Some(opacity), None),
        CatalogShadow::Unconfirmed { style, opacity } => {
            (ShadowKind::Unconfirmed, Some(opacity), Some(style))
        }
    };
    Shadow {
        kind,
        opacity,
        catalog_style,
    }
}

fn build_group(
    model: &CatalogModel,
    group: &GroupSpec,
    resolved: &ResolvedGroup,
) -> RecomposeResult<Option<Group>> {
    if group.layers.is_empty() {
        return Err(RecomposeError::inconsistent(format!(
            "group '{}' has no layers",
            group.name
        )));
    }
    if resolved.layers.len() != group.layers.len() {
        return Err(RecomposeError::inconsistent(format!(
            "group '{}' has {} layers but {} resolved layers",
            group.name,
            group.layers.len(),
            resolved.layers.len()
        )));
    }

    let layers: Vec<Layer> = match &resolved.flattened {
        Some(file) => vec![Layer {
            name: group.display_name.clone(),
            image_name: file.clone(),
            glass: group.specular,
            fill: None,
            fill_specializations: Vec::new(),
            opacity: None,
            opacity_specializations: Vec::new(),
        }],
        None => group
            .layers
            .iter()
            .zip(&resolved.layers)
            .filter_map(|(layer, r)| {
                r.outcome
                    .file_name()
                    .map(|file| build_layer(model, group, layer, file))
            })
            .collect(),
    };
    if layers.is_empty() {
        tracing::warn!(group = %group.name, "no layer of the group matched a file, group dropped");
        return Ok(None);
    }

    let (opacity, opacity_specializations) = opacity_fields(&group.opacity);
    Ok(Some(Group {
        name: Some(group.display_name.clone()),
        layers,
        blur_material: group.blur_strength.filter(|b| *b > 0.0).map(|b| rounded(b, 5)),
        lighting: group.image_only.then_some(Lighting::Individual),
        shadow: document_shadow(group.shadow),
        specular: (!group.specular).then_some(false),
        translucency: Translucency {
            enabled: group.translucency.enabled,
            value: group.translucency.value,
        },
        opacity,
        opacity_specializations,
    }))
}

/// The unique background gradient of a composable icon.
fn background_name(model: &CatalogModel) -> RecomposeResult<String> {
    if let Some(name) = model.backgrounds.get(&Appearance::Light) {
        return Ok(name.clone());
    }
    let used = model.layer_fill_refs();
    let override_backgrounds: BTreeSet<&str> = model
        .backgrounds
        .iter()
        .filter(|(a, _)| **a != Appearance::Light)
        .map(|(_, n)| n.as_str())
        .collect();
    let candidates: Vec<&str> = model
        .gradients
        .keys()
        .map(String::as_str)
        .filter(|n| {
            is_scoped(n, &model.icon_name) && !used.contains(n) && !override_backgrounds.contains(n)
        })
        .collect();
    match candidates.as_slice() {
        [one] => Ok((*one).to_owned()),
        [] => Err(RecomposeError::ambiguous(format!(
            "icon '{}' has no unreferenced gradient to use as the background fill",
            model.icon_name
        ))),
        many => Err(RecomposeError::ambiguous(format!(
            "icon '{}' has several background fill candidates: {}",
            model.icon_name,
            many.join(", ")
        ))),
    }
}

fn has_tinted_data(model: &CatalogModel, gradient: &str) -> bool {
    let Some(values) = model.gradients.get(gradient) else {
        return false;
    };
    values.tinted.is_some()
        || values.light.stops.iter().any(|s| {
            model
                .colors
                .get(&s.color_name)
                .is_some_and(|c| c.tinted.is_some())
        })
}

fn root_fill(model: &CatalogModel) -> RecomposeResult<(Fill, Vec<Specialization<Fill>>)> {
    if model.is_legacy() {
        let color = model
            .first_color()
            .map(|c| c.light.to_document_string())
            .unwrap_or_else(|| MID_GRAY.to_owned());
        return Ok((Fill::automatic(color), Vec::new()));
    }

    let name = background_name(model)?;
    let base = gradient_fill(model, &name, Appearance::Light).ok_or_else(|| {
        RecomposeError::inconsistent(format!("background gradient '{name}' does not resolve"))
    })?;

    let tinted = if has_tinted_data(model, &name) {
        gradient_fill(model, &name, Appearance::Tinted)
    } else {
        model
            .backgrounds
            .get(&Appearance::Dark)
            .filter(|dark| **dark != name)
            .and_then(|dark| gradient_fill(model, dark, Appearance::Dark))
    };
    let specializations = tinted
        .and_then(|t| base.diff(&t))
        .map(|value| Specialization {
            appearance: Appearance::Tinted,
            value,
        })
        .into_iter()
        .collect();
    tracing::debug!(background = %name, "root fill chosen");
    Ok((base, specializations))
}

fn supported_platforms(model: &CatalogModel) -> SupportedPlatforms {
    let ios = model
        .metadata
        .platform
        .as_deref()
        .is_some_and(|p| p.to_ascii_lowercase().contains("ios"));
    SupportedPlatforms {
        squares: "shared".to_owned(),
        circles: ios.then(|| vec!["watchOS".to_owned()]),
    }
}

/// Build the `icon.json` document from the model and the resolver's outcome. Pure.
#[tracing::instrument(skip_all, fields(icon = %model.icon_name))]
pub fn build_document(
    model: &CatalogModel,
    resolved: &ResolvedAssets,
) -> RecomposeResult<IconDocument> {
    if resolved.groups.len() != model.groups.len() {
        return Err(RecomposeError::inconsistent(format!(
            "model has {} groups but {} resolved groups",
            model.groups.len(),
            resolved.groups.len()
        )));
    }
    let (fill, fill_specializations) = root_fill(model)?;

    let mut groups = Vec::with_capacity(model.groups.len());
    for (group, r) in model.groups.iter().zip(&resolved.groups) {
        if let Some(g) = build_group(model, group, r)? {
            groups.push(g);
        }
    }

    let doc = IconDocument {
        fill,
        fill_specializations,
        groups,
        supported_platforms: supported_platforms(model),
    };
    tracing::info!(
        groups = doc.groups.len(),
        layers = doc.layer_count(),
        "document built"
    );
    Ok(doc)
}

#[cfg(test)]
#[path = "../../tests/unit/document/builder.rs"]
mod tests;
