use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Context;

use crate::foundation::error::{RecomposeError, RecomposeResult};
use crate::render::backend::Renderer;
use crate::render::svg_export;

/// Largest edge the native renderer allocates.
const MAX_RENDER_SIZE: u32 = 16_384;

fn system_fonts() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Arc::new(db)
    })
    .clone()
}

/// Parse SVG bytes with system fonts, resolving relative references against `resources_dir`.
pub fn parse_svg(bytes: &[u8], resources_dir: Option<&Path>) -> RecomposeResult<usvg::Tree> {
    let opts = usvg::Options {
        resources_dir: resources_dir.map(Path::to_path_buf),
        fontdb: system_fonts(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    Ok(tree)
}

/// Rasterize a parsed tree onto a `size`x`size` pixmap, scaled uniformly and centered.
pub fn rasterize_svg(tree: &usvg::Tree, size: u32) -> RecomposeResult<image::RgbaImage> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| RecomposeError::collaborator("failed to allocate svg pixmap"))?;

    let tw = tree.size().width();
    let th = tree.size().height();
    let s = (size as f32 / tw).min(size as f32 / th);
    let dx = (size as f32 - tw * s) / 2.0;
    let dy = (size as f32 - th * s) / 2.0;
    let xform = resvg::tiny_skia::Transform::from_scale(s, s).post_translate(dx, dy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(unpremultiply(size, pixmap))
}

fn unpremultiply(size: u32, pixmap: resvg::tiny_skia::Pixmap) -> image::RgbaImage {
    let mut data = pixmap.take();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    image::RgbaImage::from_raw(size, size, data).unwrap_or_else(|| image::RgbaImage::new(size, size))
}

/// In-process renderer: `resvg` for SVG, `image` for rasters, SVG export for `.icon` bundles.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeRenderer;

impl Renderer for NativeRenderer {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    fn render(&self, path: &Path, size: u32) -> RecomposeResult<image::RgbaImage> {
        if size == 0 || size > MAX_RENDER_SIZE {
            return Err(RecomposeError::collaborator(format!(
                "render size {size} outside 1..={MAX_RENDER_SIZE}"
            )));
        }
        if path.is_dir() {
            if path.join("icon.json").is_file() {
                let svg = svg_export::bundle_svg(path)?;
                let tree = parse_svg(svg.as_bytes(), Some(path))?;
                return rasterize_svg(&tree, size);
            }
            return Err(RecomposeError::collaborator(format!(
                "{} is a directory without icon.json, no native rendering",
                path.display()
            )));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        match ext.as_str() {
            "svg" => {
                let tree = parse_svg(&bytes, path.parent())?;
                rasterize_svg(&tree, size)
            }
            "pdf" => Err(RecomposeError::collaborator(format!(
                "{}: pdf rendering needs an external renderer",
                path.display()
            ))),
            _ => {
                let img = image::load_from_memory(&bytes)
                    .with_context(|| format!("decode image {}", path.display()))?;
                Ok(img
                    .resize_exact(size, size, image::imageops::FilterType::Triangle)
                    .to_rgba8())
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/native.rs"]
mod tests;
