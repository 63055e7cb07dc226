use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::assets::files::{AssetFile, list_extracted_dir};
use crate::foundation::error::{RecomposeError, RecomposeResult};
use crate::render::backend::{Extractor, Renderer};

/// Run `cmd` to completion, turning a spawn failure or non-zero exit into a collaborator error.
fn run(mut cmd: Command, what: &str) -> RecomposeResult<()> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| RecomposeError::collaborator(format!("failed to start {what}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RecomposeError::collaborator(format!(
            "{what} exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Renders through an external thumbnailer invoked as `program <source> <out.png> <size>`.
#[derive(Clone, Debug)]
pub struct CommandRenderer {
    pub program: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Renderer for CommandRenderer {
    #[tracing::instrument(skip(self), fields(program = %self.program.display(), path = %path.display()))]
    fn render(&self, path: &Path, size: u32) -> RecomposeResult<image::RgbaImage> {
        let scratch = tempfile::Builder::new()
            .prefix("recompose-render-")
            .tempdir()
            .context("create render scratch dir")?;
        let out = scratch.path().join("render.png");

        let mut cmd = Command::new(&self.program);
        cmd.arg(path).arg(&out).arg(size.to_string());
        run(cmd, "thumbnailer")?;

        let bytes = std::fs::read(&out).map_err(|e| {
            RecomposeError::collaborator(format!(
                "thumbnailer produced no image for {}: {e}",
                path.display()
            ))
        })?;
        let img = image::load_from_memory(&bytes).map_err(|e| {
            RecomposeError::collaborator(format!(
                "thumbnailer output for {} is not an image: {e}",
                path.display()
            ))
        })?;
        let img = if img.width() != size || img.height() != size {
            img.resize_exact(size, size, image::imageops::FilterType::Triangle)
        } else {
            img
        };
        Ok(img.to_rgba8())
    }
}

/// Extracts a compiled catalog through an external tool invoked as `program <source> <out_dir>`.
#[derive(Clone, Debug)]
pub struct CommandExtractor {
    pub program: PathBuf,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Extractor for CommandExtractor {
    #[tracing::instrument(skip(self), fields(program = %self.program.display()))]
    fn extract(&self, source: &Path, out_dir: &Path) -> RecomposeResult<Vec<AssetFile>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("create extraction dir {}", out_dir.display()))?;
        let mut cmd = Command::new(&self.program);
        cmd.arg(source).arg(out_dir);
        run(cmd, "extractor")?;
        let files = list_extracted_dir(out_dir)?;
        tracing::info!(files = files.len(), "catalog extracted");
        Ok(files)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/command.rs"]
mod tests;
