//! Match extracted files to catalog layers and lay them out in the bundle's `Assets/`.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use sha2::{Digest, Sha256};

use crate::assets::files::{
    AssetFile, appearance_marker, belongs_to, group_file_name, layer_file_name, match_key,
    normalize, split_scale, strip_extractor_suffix,
};
use crate::assets::flatten::{flatten_group, should_flatten};
use crate::catalog::model::{CatalogModel, StemSource};
use crate::foundation::core::{Appearance, Canvas, Rect};
use crate::foundation::error::RecomposeResult;
use crate::render::backend::Renderer;

/// Optional resolver stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResolveOptions {
    /// Merge qualifying all-vector glass groups into one file.
    pub flatten: bool,
    /// Place partial-canvas bitmaps onto a full-canvas image.
    pub reframe: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            flatten: true,
            reframe: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerOutcome {
    /// The layer owns `file_name`.
    Matched { file_name: String },
    /// The layer reuses the file of an earlier layer (`with`) that has the same stem.
    Shared { file_name: String, with: String },
    /// No extracted file belongs to the layer.
    Unmatched,
}

impl LayerOutcome {
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::Matched { file_name } | Self::Shared { file_name, .. } => Some(file_name),
            Self::Unmatched => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLayer {
    pub outcome: LayerOutcome,
    /// Appearances of extracted bitmap siblings that were not copied.
    pub marked_variants: Vec<Appearance>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// Parallel to the model group's layers.
    pub layers: Vec<ResolvedLayer>,
    /// Merged file when the group was flattened.
    pub flattened: Option<String>,
}

/// Result of one resolver pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    /// Parallel to the model's groups.
    pub groups: Vec<ResolvedGroup>,
    /// Layer stem to final file name.
    pub filenames: BTreeMap<String, String>,
    /// Every file name present in `Assets/` after the pass.
    pub copied: BTreeSet<String>,
    /// Pre-rendered reference bitmap, outside `Assets/`.
    pub reference: Option<PathBuf>,
}

/// An extracted file attributed to one stem.
#[derive(Clone, Debug)]
struct Candidate<'a> {
    file: &'a AssetFile,
    scale: u32,
    marker: Option<Appearance>,
    /// Normalized base without extractor suffix or scale, plus extension.
    clean: String,
}

impl Candidate<'_> {
    fn preference(&self) -> (bool, Reverse<u32>, usize, &str) {
        (
            self.marker.is_some(),
            Reverse(self.scale),
            self.file.file_name.len(),
            self.file.file_name.as_str(),
        )
    }
}

/// Attribute each file to the longest stem key it belongs to.
fn collect_candidates<'a>(
    stems: &BTreeSet<String>,
    files: &'a [AssetFile],
) -> BTreeMap<String, Vec<Candidate<'a>>> {
    let mut keys: Vec<&String> = stems.iter().collect();
    keys.sort_by_key(|k| Reverse(k.len()));

    let mut by_stem: BTreeMap<String, Vec<Candidate<'a>>> = BTreeMap::new();
    for file in files {
        let base = strip_extractor_suffix(&file.stem);
        let (unscaled, scale) = split_scale(&base);
        let file_key = normalize(unscaled);
        let Some(stem_key) = keys.iter().find(|k| belongs_to(&file_key, k)) else {
            tracing::debug!(file = %file.file_name, "file matches no catalog stem, dropped");
            continue;
        };
        by_stem
            .entry((*stem_key).clone())
            .or_default()
            .push(Candidate {
                file,
                scale,
                marker: appearance_marker(&file_key, stem_key),
                clean: format!("{file_key}.{}", file.extension),
            });
    }
    by_stem
}

/// Sort by preference, then drop lower-scale and byte-identical duplicates.
fn dedupe(mut candidates: Vec<Candidate<'_>>) -> RecomposeResult<Vec<Candidate<'_>>> {
    candidates.sort_by(|a, b| a.preference().cmp(&b.preference()));

    let mut seen_clean = BTreeSet::new();
    candidates.retain(|c| {
        let keep = seen_clean.insert(c.clean.clone());
        if !keep {
            tracing::debug!(file = %c.file.file_name, "lower-scale duplicate dropped");
        }
        keep
    });

    let mut seen_digest = BTreeSet::new();
    let mut kept = Vec::with_capacity(candidates.len());
    for c in candidates {
        let bytes = std::fs::read(&c.file.path)
            .with_context(|| format!("read extracted file {}", c.file.path.display()))?;
        if seen_digest.insert(Sha256::digest(&bytes).to_vec()) {
            kept.push(c);
        } else {
            tracing::debug!(file = %c.file.file_name, "byte-identical duplicate dropped");
        }
    }
    Ok(kept)
}

fn copy_into(src: &Path, assets_dir: &Path, name: &str) -> RecomposeResult<()> {
    let dst = assets_dir.join(name);
    std::fs::copy(src, &dst)
        .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Match, copy and rename the extracted files of `model` into `assets_dir`.
#[tracing::instrument(skip_all, fields(icon = %model.icon_name, files = files.len()))]
pub fn resolve_assets(
    model: &CatalogModel,
    files: &[AssetFile],
    assets_dir: &Path,
    renderer: &dyn Renderer,
    options: ResolveOptions,
) -> RecomposeResult<ResolvedAssets> {
    std::fs::create_dir_all(assets_dir)
        .with_context(|| format!("create assets dir {}", assets_dir.display()))?;

    let stems: BTreeSet<String> = model
        .groups
        .iter()
        .flat_map(|g| &g.layers)
        .map(|l| l.stem.as_str())
        .chain(model.reference_stem.as_deref())
        .map(match_key)
        .collect();
    let mut by_stem = collect_candidates(&stems, files);
    for candidates in by_stem.values_mut() {
        *candidates = dedupe(std::mem::take(candidates))?;
    }

    let mut out = ResolvedAssets::default();
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for (gi, group) in model.groups.iter().enumerate() {
        let mut layers = Vec::with_capacity(group.layers.len());
        for (li, layer) in group.layers.iter().enumerate() {
            if let Some(file_name) = out.filenames.get(&layer.stem) {
                let with = owners.get(layer.stem.as_str()).copied().unwrap_or_default();
                tracing::info!(layer = %layer.name, with, file = %file_name, "layer shares its file");
                layers.push(ResolvedLayer {
                    outcome: LayerOutcome::Shared {
                        file_name: file_name.clone(),
                        with: with.to_owned(),
                    },
                    marked_variants: Vec::new(),
                });
                continue;
            }

            let candidates = by_stem
                .get(&match_key(&layer.stem))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (unmarked, marked): (Vec<&Candidate<'_>>, Vec<&Candidate<'_>>) =
                candidates.iter().partition(|c| c.marker.is_none());
            let mut marked_variants: Vec<Appearance> =
                marked.iter().filter_map(|c| c.marker).collect();
            marked_variants.sort();
            marked_variants.dedup();

            let (chosen, others): (&Candidate<'_>, &[&Candidate<'_>]) =
                match (unmarked.split_first(), marked.first()) {
                    (Some((chosen, others)), _) => (*chosen, others),
                    (None, Some(chosen)) => {
                        tracing::warn!(
                            layer = %layer.name,
                            file = %chosen.file.file_name,
                            "only appearance-marked files for layer, using the best of them"
                        );
                        (*chosen, &[][..])
                    }
                    (None, None) => {
                        match layer.stem_source {
                            StemSource::Rendition => tracing::warn!(
                                layer = %layer.name,
                                stem = %layer.stem,
                                "no extracted file for layer"
                            ),
                            StemSource::LayerName => tracing::warn!(
                                layer = %layer.name,
                                stem = %layer.stem,
                                "layer has no rendition and no file matches its name"
                            ),
                        }
                        layers.push(ResolvedLayer {
                            outcome: LayerOutcome::Unmatched,
                            marked_variants: Vec::new(),
                        });
                        continue;
                    }
                };

            let final_name =
                layer_file_name(gi, li, &layer.display_name, &chosen.file.extension);
            copy_into(&chosen.file.path, assets_dir, &final_name)?;
            out.copied.insert(final_name.clone());
            tracing::debug!(layer = %layer.name, from = %chosen.file.file_name, to = %final_name, "layer matched");
            for other in others {
                if out.copied.insert(other.file.file_name.clone()) {
                    copy_into(&other.file.path, assets_dir, &other.file.file_name)?;
                    tracing::debug!(file = %other.file.file_name, layer = %layer.name, "unchosen candidate kept");
                }
            }

            out.filenames.insert(layer.stem.clone(), final_name.clone());
            owners.insert(&layer.stem, &layer.name);
            layers.push(ResolvedLayer {
                outcome: LayerOutcome::Matched {
                    file_name: final_name,
                },
                marked_variants,
            });
        }
        out.groups.push(ResolvedGroup {
            layers,
            flattened: None,
        });
    }

    if options.flatten {
        flatten_groups(model, assets_dir, &mut out)?;
    }
    if options.reframe {
        reframe_bitmaps(model, assets_dir, renderer, &out)?;
    }

    out.reference = model
        .reference_stem
        .as_deref()
        .and_then(|stem| by_stem.get(&match_key(stem)))
        .and_then(|cands| {
            cands
                .iter()
                .find(|c| c.marker.is_none() && c.file.extension == "png")
        })
        .map(|c| c.file.path.clone());

    let unmatched = out
        .groups
        .iter()
        .flat_map(|g| &g.layers)
        .filter(|l| l.outcome == LayerOutcome::Unmatched)
        .count();
    tracing::info!(
        unmatched,
        copied = out.copied.len(),
        flattened = out.groups.iter().filter(|g| g.flattened.is_some()).count(),
        reference = out.reference.is_some(),
        "assets resolved"
    );
    Ok(out)
}

fn flatten_groups(
    model: &CatalogModel,
    assets_dir: &Path,
    out: &mut ResolvedAssets,
) -> RecomposeResult<()> {
    let shared: BTreeSet<String> = out
        .groups
        .iter()
        .flat_map(|g| &g.layers)
        .filter_map(|l| match &l.outcome {
            LayerOutcome::Shared { file_name, .. } => Some(file_name.clone()),
            _ => None,
        })
        .collect();

    for (gi, group) in model.groups.iter().enumerate() {
        let Some(resolved) = out.groups.get(gi) else {
            continue;
        };
        let owned: Option<Vec<String>> = resolved
            .layers
            .iter()
            .map(|l| match &l.outcome {
                LayerOutcome::Matched { file_name } => Some(file_name.clone()),
                _ => None,
            })
            .collect();
        let all_own_svgs = owned.as_ref().is_some_and(|names| {
            names
                .iter()
                .all(|n| n.ends_with(".svg") && !shared.contains(n))
        });
        if !should_flatten(model, group, all_own_svgs) {
            let mixed = owned.as_ref().is_some_and(|names| {
                names.iter().any(|n| n.ends_with(".svg")) && names.iter().any(|n| !n.ends_with(".svg"))
            });
            if mixed && (group.specular || group.blur_strength.is_some()) {
                tracing::info!(group = %group.name, "mixed vector and raster group stays unflattened");
            }
            continue;
        }
        let names = owned.unwrap_or_default();
        let sources: Vec<PathBuf> = names.iter().map(|n| assets_dir.join(n)).collect();
        let svg = flatten_group(model, group, &sources)?;

        let merged = group_file_name(gi, &group.display_name);
        let merged_path = assets_dir.join(&merged);
        std::fs::write(&merged_path, svg)
            .with_context(|| format!("write {}", merged_path.display()))?;
        for name in names.iter().filter(|n| **n != merged) {
            let path = assets_dir.join(name);
            std::fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            out.copied.remove(name);
        }
        out.copied.insert(merged.clone());
        for layer in &group.layers {
            out.filenames.insert(layer.stem.clone(), merged.clone());
        }
        tracing::info!(group = %group.name, layers = names.len(), file = %merged, "group flattened");
        if let Some(resolved) = out.groups.get_mut(gi) {
            resolved.flattened = Some(merged);
        }
    }
    Ok(())
}

fn same_rect(a: Rect, b: Rect) -> bool {
    (a.x0 - b.x0).abs() < 0.5
        && (a.y0 - b.y0).abs() < 0.5
        && (a.x1 - b.x1).abs() < 0.5
        && (a.y1 - b.y1).abs() < 0.5
}

/// `true` when an image of `w`x`h` already covers the canvas at some integer scale.
fn fills_canvas(w: u32, h: u32, canvas: Canvas) -> bool {
    u64::from(w) * u64::from(canvas.height) == u64::from(h) * u64::from(canvas.width)
        && w >= canvas.width
}

fn reframe_bitmaps(
    model: &CatalogModel,
    assets_dir: &Path,
    renderer: &dyn Renderer,
    out: &ResolvedAssets,
) -> RecomposeResult<()> {
    let canvas = model.canvas;
    let mut done = BTreeSet::new();
    for (group, resolved) in model.groups.iter().zip(&out.groups) {
        if resolved.flattened.is_some() {
            continue;
        }
        for (layer, r) in group.layers.iter().zip(&resolved.layers) {
            let (Some(rect), LayerOutcome::Matched { file_name }) = (layer.geometry, &r.outcome)
            else {
                continue;
            };
            if !file_name.ends_with(".png") || same_rect(rect, canvas.rect()) {
                continue;
            }
            if !done.insert(file_name.as_str()) {
                continue;
            }
            let path = assets_dir.join(file_name);
            let (w, h) = image::image_dimensions(&path)
                .with_context(|| format!("read image size of {}", path.display()))?;
            if fills_canvas(w, h, canvas) {
                tracing::debug!(file = %file_name, "bitmap already covers the canvas");
                continue;
            }
            reframe_png(&path, rect, canvas, renderer)?;
            tracing::debug!(file = %file_name, x = rect.x0, y = rect.y0, "bitmap reframed onto the canvas");
        }
    }
    Ok(())
}

/// Render the bitmap at its recorded size and place it on a transparent canvas.
fn reframe_png(
    path: &Path,
    rect: Rect,
    canvas: Canvas,
    renderer: &dyn Renderer,
) -> RecomposeResult<()> {
    let w = rect.width().round().max(1.0) as u32;
    let h = rect.height().round().max(1.0) as u32;
    let rendered = renderer.render(path, w.max(h))?;
    let placed = if rendered.dimensions() == (w, h) {
        rendered
    } else {
        image::imageops::resize(&rendered, w, h, image::imageops::FilterType::Triangle)
    };
    let mut framed = image::RgbaImage::new(canvas.width, canvas.height);
    image::imageops::overlay(
        &mut framed,
        &placed,
        rect.x0.round() as i64,
        rect.y0.round() as i64,
    );
    framed
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write reframed {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolver.rs"]
mod tests;
