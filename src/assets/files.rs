//! Naming rules for files written by the catalog extractor.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;

use crate::foundation::core::Appearance;
use crate::foundation::error::RecomposeResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Vector,
    Raster,
}

impl AssetKind {
    /// `.svg`/`.pdf` are vector, `.png` raster; nothing else is an asset.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" | "pdf" => Some(Self::Vector),
            "png" => Some(Self::Raster),
            _ => None,
        }
    }
}

/// One extracted file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetFile {
    pub path: PathBuf,
    pub file_name: String,
    /// File name without extension.
    pub stem: String,
    /// Lowercased extension.
    pub extension: String,
    pub kind: AssetKind,
}

impl AssetFile {
    /// `None` for paths that are not assets (unknown extension, no file name).
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_owned();
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        let kind = AssetKind::from_extension(ext)?;
        Some(Self {
            stem: stem.to_owned(),
            extension: ext.to_ascii_lowercase(),
            kind,
            file_name,
            path,
        })
    }
}

/// List the assets of a flat extraction directory, sorted by file name.
pub fn list_extracted_dir(dir: &Path) -> RecomposeResult<Vec<AssetFile>> {
    let mut files = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read extracted dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match AssetFile::from_path(&path) {
            Some(f) => files.push(f),
            None => tracing::debug!(path = %path.display(), "not an asset, skipped"),
        }
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

/// Lowercase, spaces and `/` to `_`.
pub fn normalize(s: &str) -> String {
    s.to_lowercase().replace([' ', '/'], "_")
}

fn scale_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\d+)x$").expect("valid scale regex"))
}

fn act_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(_Normal(?:_\d+)?|_unspecified_unspecified_automatic(?:_\d+)?)((?:@\d+x)?)$")
            .expect("valid extractor suffix regex")
    })
}

/// Split a trailing `@Nx` scale suffix off a base name. No suffix means scale 1.
pub fn split_scale(base: &str) -> (&str, u32) {
    match scale_regex().captures(base) {
        Some(c) => {
            let whole = c.get(0).map_or(0, |m| m.start());
            let scale = c
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            (&base[..whole], scale)
        }
        None => (base, 1),
    }
}

/// Remove the extractor's duplicate markers (`_Normal`, `_Normal_2`,
/// `_unspecified_unspecified_automatic`), keeping any scale suffix.
pub fn strip_extractor_suffix(base: &str) -> String {
    act_suffix_regex().replace(base, "$2").into_owned()
}

/// Key used for matching a file base against a rendition stem: normalized, scale stripped.
pub fn match_key(base: &str) -> String {
    let normalized = normalize(base);
    split_scale(&normalized).0.to_owned()
}

/// `true` when a file's match key belongs to a stem's match key.
pub fn belongs_to(file_key: &str, stem_key: &str) -> bool {
    file_key == stem_key
        || file_key
            .strip_prefix(stem_key)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Appearance marker carried by the `_`-separated tokens after the stem, if any.
pub fn appearance_marker(file_key: &str, stem_key: &str) -> Option<Appearance> {
    let rest = file_key.strip_prefix(stem_key)?;
    rest.split('_').find_map(|token| match token {
        "dark" => Some(Appearance::Dark),
        "tinted" | "tintable" => Some(Appearance::Tinted),
        _ => None,
    })
}

/// Display name reduced to `[A-Za-z0-9_.-]`, never empty.
pub fn sanitize(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = safe.trim_matches('_');
    if trimmed.is_empty() {
        "layer".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Final name of a layer file: `{group:02}_{layer:02}_{display}.{ext}`, 1-based.
pub fn layer_file_name(group: usize, layer: usize, display: &str, ext: &str) -> String {
    format!("{:02}_{:02}_{}.{ext}", group + 1, layer + 1, sanitize(display))
}

/// Final name of a flattened group: `{group:02}_{display}.svg`, 1-based.
pub fn group_file_name(group: usize, display: &str) -> String {
    format!("{:02}_{}.svg", group + 1, sanitize(display))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/files.rs"]
mod tests;
