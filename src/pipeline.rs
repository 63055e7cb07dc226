//! End-to-end flows: build a `.icon` bundle, score an existing one.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assets::files::{AssetFile, list_extracted_dir};
use crate::assets::resolver::{ResolveOptions, resolve_assets};
use crate::catalog::entry::filter_catalog;
use crate::catalog::model::CatalogModel;
use crate::discrepancy::{DiscrepancyRecord, detect, write_report};
use crate::document::builder::build_document;
use crate::document::model::IconDocument;
use crate::foundation::error::{RecomposeError, RecomposeResult};
use crate::render::backend::{Extractor, Renderer};
use crate::score::{FidelityScore, score_images};

/// File names inside a bundle.
pub const DOCUMENT_FILE: &str = "icon.json";
pub const CATALOG_FILE: &str = "catalog.json";
pub const REFERENCE_FILE: &str = "reference.png";
pub const ASSETS_DIR: &str = "Assets";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Merge all-vector glass groups into one file.
    pub flatten_vector_groups: bool,
    /// Place partial-canvas bitmaps onto full-canvas images.
    pub reframe_bitmaps: bool,
    /// Edge of the renderings used for scoring.
    pub render_size: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            flatten_vector_groups: true,
            reframe_bitmaps: true,
            render_size: 1024,
        }
    }
}

impl PipelineOptions {
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            flatten: self.flatten_vector_groups,
            reframe: self.reframe_bitmaps,
        }
    }
}

/// Where the per-layer files come from.
#[derive(Clone, Copy)]
pub enum AssetSource<'a> {
    /// Files already extracted into a flat directory.
    Directory(&'a Path),
    /// A compiled catalog to run through an extractor.
    Catalog {
        car: &'a Path,
        extractor: &'a dyn Extractor,
    },
}

/// Outcome of a successful build.
#[derive(Clone, Debug)]
pub struct BuildReport {
    pub bundle: PathBuf,
    pub document: IconDocument,
    pub discrepancies: Vec<DiscrepancyRecord>,
}

/// App name recorded in reports: the bundle's file name without `.icon`.
pub fn app_name(bundle: &Path) -> String {
    let name = bundle
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".icon").unwrap_or(&name).to_owned()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RecomposeResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Move a finished staging directory onto `out`, replacing what was there.
///
/// Whatever sat at `out` is moved aside into `parent` first and removed only once the
/// new bundle is in place. If that last rename fails it is moved back.
fn commit(staged: &Path, out: &Path, parent: &Path) -> RecomposeResult<()> {
    let previous = if out.exists() || out.is_symlink() {
        let aside = tempfile::Builder::new()
            .prefix(".recompose-old-")
            .tempdir_in(parent)
            .context("create backup dir")?;
        let held = aside.path().join("previous");
        std::fs::rename(out, &held)
            .with_context(|| format!("move previous bundle {} aside", out.display()))?;
        Some((aside, held))
    } else {
        None
    };

    if let Err(err) = std::fs::rename(staged, out) {
        if let Some((aside, held)) = previous
            && let Err(restore) = std::fs::rename(&held, out)
        {
            let kept = aside.keep();
            tracing::warn!(
                error = %restore,
                kept = %kept.display(),
                "could not restore previous bundle"
            );
        }
        if let Err(cleanup) = std::fs::remove_dir_all(staged) {
            tracing::warn!(error = %cleanup, staged = %staged.display(), "staging dir left behind");
        }
        return Err(anyhow::Error::new(err)
            .context(format!("move bundle into place at {}", out.display()))
            .into());
    }

    if let Some((aside, _)) = previous {
        let path = aside.path().to_path_buf();
        if let Err(err) = aside.close() {
            tracing::warn!(error = %err, path = %path.display(), "previous bundle left behind");
        }
    }
    Ok(())
}

/// Reconstruct a bundle at `out` from a raw catalog dump and the icon's layer files.
///
/// The bundle is assembled next to `out` and only moved into place once every stage
/// succeeded, so a failed run never leaves a partial bundle behind.
#[tracing::instrument(skip(raw, source, renderer, options), fields(out = %out.display()))]
pub fn build_bundle(
    raw: &[serde_json::Value],
    icon_name: &str,
    source: AssetSource<'_>,
    out: &Path,
    renderer: &dyn Renderer,
    options: &PipelineOptions,
) -> RecomposeResult<BuildReport> {
    let filtered = filter_catalog(raw, icon_name);
    let model = CatalogModel::from_json(&filtered, icon_name)?;

    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("create output dir {}", parent.display()))?;
    let staging = tempfile::Builder::new()
        .prefix(".recompose-")
        .tempdir_in(&parent)
        .context("create staging dir")?;

    let mut _scratch = None;
    let files: Vec<AssetFile> = match source {
        AssetSource::Directory(dir) => list_extracted_dir(dir)?,
        AssetSource::Catalog { car, extractor } => {
            let scratch = tempfile::Builder::new()
                .prefix("recompose-extract-")
                .tempdir()
                .context("create extraction dir")?;
            let files = extractor.extract(car, scratch.path())?;
            _scratch = Some(scratch);
            files
        }
    };
    tracing::info!(files = files.len(), "extracted files listed");

    let resolved = resolve_assets(
        &model,
        &files,
        &staging.path().join(ASSETS_DIR),
        renderer,
        options.resolve_options(),
    )?;
    let document = build_document(&model, &resolved)?;

    write_json(&staging.path().join(CATALOG_FILE), &filtered)?;
    write_json(&staging.path().join(DOCUMENT_FILE), &document)?;
    if let Some(reference) = &resolved.reference {
        let dst = staging.path().join(REFERENCE_FILE);
        std::fs::copy(reference, &dst)
            .with_context(|| format!("copy reference {}", reference.display()))?;
    }

    let discrepancies = detect(&model, &resolved, &document);
    write_report(staging.path(), &app_name(out), icon_name, &discrepancies)?;

    commit(&staging.keep(), out, &parent)?;
    tracing::info!(
        groups = document.groups.len(),
        layers = document.layer_count(),
        discrepancies = discrepancies.len(),
        "bundle written"
    );
    Ok(BuildReport {
        bundle: out.to_path_buf(),
        document,
        discrepancies,
    })
}

/// Score a bundle against its stored reference, or against a rendering of `app_path`.
#[tracing::instrument(skip(renderer), fields(bundle = %bundle.display()))]
pub fn score_bundle(
    bundle: &Path,
    app_path: Option<&Path>,
    renderer: &dyn Renderer,
    size: u32,
) -> RecomposeResult<FidelityScore> {
    let stored = bundle.join(REFERENCE_FILE);
    let reference = if stored.is_file() {
        image::open(&stored)
            .with_context(|| format!("decode {}", stored.display()))?
            .to_rgba8()
    } else if let Some(app) = app_path {
        renderer.render(app, size)?
    } else {
        return Err(RecomposeError::malformed(format!(
            "{} has no {REFERENCE_FILE} and no app path was given",
            bundle.display()
        )));
    };
    let candidate = renderer.render(bundle, size)?;
    let score = score_images(&reference, &candidate);
    tracing::info!(total = score.total, "bundle scored");
    Ok(score)
}

#[cfg(test)]
#[path = "../tests/unit/pipeline/bundle.rs"]
mod tests;
