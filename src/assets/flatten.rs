//! Merge the vector layers of one group into a single composite SVG.
//!
//! Icon Composer applies glass and blur per layer, while the catalog applies them to the
//! whole group. Merging keeps the group's look under a single effect application.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;

use crate::catalog::model::{CatalogModel, GroupSpec};
use crate::document::builder::{layer_fill, varies_by_appearance};
use crate::foundation::core::{Appearance, OPACITY_EPSILON};
use crate::foundation::error::{RecomposeError, RecomposeResult};
use crate::render::svg_export::{EmbeddedSvg, SvgPaint, num};

/// `true` when `group` qualifies for merging, given whether every layer matched its own `.svg`.
///
/// Merging bakes the Light look, so a layer that looks different under Dark or Tinted
/// keeps the group unmerged.
pub fn should_flatten(model: &CatalogModel, group: &GroupSpec, all_own_svgs: bool) -> bool {
    all_own_svgs
        && group.layers.len() > 1
        && (group.specular || group.blur_strength.is_some())
        && !group.layers.iter().any(|l| varies_by_appearance(model, l))
}

/// Composite SVG of `group`, one source file per layer in group order.
///
/// Each layer keeps its geometry on the canvas, its Light fill is baked as a gradient masked
/// by the layer's shape, and its Light opacity is baked.
#[tracing::instrument(skip(model, group, sources), fields(group = %group.name))]
pub fn flatten_group(
    model: &CatalogModel,
    group: &GroupSpec,
    sources: &[PathBuf],
) -> RecomposeResult<String> {
    if sources.len() != group.layers.len() {
        return Err(RecomposeError::inconsistent(format!(
            "group '{}' has {} layers but {} source files",
            group.name,
            group.layers.len(),
            sources.len()
        )));
    }
    let canvas = model.canvas;
    let mut defs = String::new();
    let mut body = String::new();

    // Front-most layer first in the group, so paint in reverse.
    for (i, (layer, path)) in group.layers.iter().zip(sources).enumerate().rev() {
        let bytes =
            std::fs::read(path).with_context(|| format!("read layer svg {}", path.display()))?;
        let svg = EmbeddedSvg::parse(&bytes, &format!("l{i}_"))?;
        let target = layer.geometry.unwrap_or_else(|| canvas.rect());
        let placed = svg.stretched(target);

        let opacity = layer.opacity.light;
        let op = if (opacity - 1.0).abs() > OPACITY_EPSILON {
            format!(r#" opacity="{}""#, num(opacity))
        } else {
            String::new()
        };

        let paint = layer
            .fill
            .light
            .as_deref()
            .and_then(|name| layer_fill(model, name, Appearance::Light))
            .and_then(|fill| SvgPaint::from_fill(&fill));
        match paint {
            Some(paint) => {
                let grad = format!("l{i}_fill");
                let mask = format!("l{i}_mask");
                defs.push_str(&paint.gradient_element(&grad));
                let _ = write!(
                    defs,
                    r#"<mask id="{mask}" style="mask-type:alpha">{placed}</mask>"#
                );
                let _ = write!(
                    body,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="url(#{grad})" mask="url(#{mask})"{op}/>"#,
                    num(target.x0),
                    num(target.y0),
                    num(target.width()),
                    num(target.height())
                );
            }
            None => {
                let _ = write!(body, "<g{op}>{placed}</g>");
            }
        }
        tracing::debug!(layer = %layer.name, file = %path.display(), "layer merged");
    }

    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = canvas.width,
        h = canvas.height
    );
    out.push('\n');
    if !defs.is_empty() {
        let _ = writeln!(out, "<defs>{defs}</defs>");
    }
    out.push_str(&body);
    out.push_str("\n</svg>\n");
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/flatten.rs"]
mod tests;
