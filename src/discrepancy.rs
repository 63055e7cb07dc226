//! Typed records of everything the reconstruction could not carry over.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assets::resolver::{LayerOutcome, ResolvedAssets};
use crate::catalog::model::CatalogModel;
use crate::document::model::IconDocument;
use crate::foundation::core::Appearance;
use crate::foundation::error::RecomposeResult;

/// File name of the report inside a bundle.
pub const REPORT_FILE: &str = "discrepancies.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A non-baseline bitmap the document has no slot for.
    BitmapAppearanceVariant {
        group: String,
        layer: String,
        appearance: Appearance,
    },
    /// A file in `Assets/` that no layer references.
    OrphanedAsset { asset_file: String },
    /// A catalog layer with no matching file.
    UnmatchedCatalogLayer { layer: String },
    /// Only pre-rendered bitmaps were available.
    LegacyBitmapFallback,
    /// Locale-specific renditions were passed over.
    LocaleVariantUnused,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    #[serde(flatten)]
    pub kind: DiscrepancyKind,
    pub description: String,
}

impl DiscrepancyRecord {
    fn new(kind: DiscrepancyKind, description: String) -> Self {
        Self { kind, description }
    }
}

/// Contents of `discrepancies.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub app: String,
    pub icon_name: String,
    pub clean: bool,
    pub discrepancies: Vec<DiscrepancyRecord>,
}

fn appearance_label(appearance: Appearance) -> &'static str {
    match appearance {
        Appearance::Light => "Light",
        Appearance::Dark => "Dark",
        Appearance::Tinted => "Tinted",
    }
}

/// Compare the model, the resolver's outcome and the built document.
///
/// Pure and order-stable: appearance variants, orphaned assets (by file name), unmatched
/// layers, legacy fallback, unused locale variants.
pub fn detect(
    model: &CatalogModel,
    resolved: &ResolvedAssets,
    doc: &IconDocument,
) -> Vec<DiscrepancyRecord> {
    let mut records = Vec::new();
    let pairs = || {
        model
            .groups
            .iter()
            .zip(&resolved.groups)
            .flat_map(|(g, rg)| g.layers.iter().zip(&rg.layers).map(move |(l, rl)| (g, l, rl)))
    };

    let mut seen_variants = BTreeSet::new();
    for (group, layer, rl) in pairs() {
        let marked = match rl.outcome {
            LayerOutcome::Unmatched => &[][..],
            _ => rl.marked_variants.as_slice(),
        };
        let variants = marked
            .iter()
            .map(|a| (*a, layer.short_name.clone()))
            .chain(layer.appearance_variants.iter().map(|v| (v.appearance, v.layer.clone())));
        for (appearance, name) in variants {
            if !seen_variants.insert((group.short_name.clone(), name.clone(), appearance)) {
                continue;
            }
            let description = format!(
                "Group \"{}\": {} variant \"{name}\" not representable in Icon Composer (only one image-name per layer)",
                group.short_name,
                appearance_label(appearance)
            );
            records.push(DiscrepancyRecord::new(
                DiscrepancyKind::BitmapAppearanceVariant {
                    group: group.short_name.clone(),
                    layer: name,
                    appearance,
                },
                description,
            ));
        }
    }

    let referenced: BTreeSet<&str> = doc.image_names().collect();
    for file in resolved.copied.iter().filter(|f| !referenced.contains(f.as_str())) {
        records.push(DiscrepancyRecord::new(
            DiscrepancyKind::OrphanedAsset {
                asset_file: file.clone(),
            },
            format!("{file}: present in Assets/ but not referenced by icon.json"),
        ));
    }

    for (_, layer, rl) in pairs() {
        if rl.outcome == LayerOutcome::Unmatched {
            records.push(DiscrepancyRecord::new(
                DiscrepancyKind::UnmatchedCatalogLayer {
                    layer: layer.short_name.clone(),
                },
                format!(
                    "{}: present in catalog but not matched to any asset in icon.json",
                    layer.short_name
                ),
            ));
        }
    }

    if model.is_legacy() {
        records.push(DiscrepancyRecord::new(
            DiscrepancyKind::LegacyBitmapFallback,
            format!(
                "{}: icon contains only pre-rendered bitmaps with no composable layers, using highest-resolution bitmap as single-layer fallback",
                model.icon_name
            ),
        ));
    }

    let mut seen_locales = BTreeSet::new();
    for (_, layer, _) in pairs() {
        if layer.locale_variants.is_empty() || !seen_locales.insert(layer.name.as_str()) {
            continue;
        }
        records.push(DiscrepancyRecord::new(
            DiscrepancyKind::LocaleVariantUnused,
            format!(
                "{}: locale-specific glyph variant(s) ({}) exist but were not selected, Latin variant preferred",
                layer.short_name,
                layer.locale_variants.join(", ")
            ),
        ));
    }

    tracing::info!(count = records.len(), "discrepancies detected");
    records
}

/// Write `discrepancies.json` into `bundle` when `records` is non-empty, else remove a stale one.
pub fn write_report(
    bundle: &Path,
    app: &str,
    icon_name: &str,
    records: &[DiscrepancyRecord],
) -> RecomposeResult<Option<PathBuf>> {
    let path = bundle.join(REPORT_FILE);
    if records.is_empty() {
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("remove stale {}", path.display()))?;
        }
        return Ok(None);
    }
    let report = DiscrepancyReport {
        app: app.to_owned(),
        icon_name: icon_name.to_owned(),
        clean: false,
        discrepancies: records.to_vec(),
    };
    let text = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(Some(path))
}

#[cfg(test)]
#[path = "../tests/unit/discrepancy/detect.rs"]
mod tests;
