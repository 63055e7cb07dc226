use std::path::Path;

use crate::assets::files::AssetFile;
use crate::foundation::error::RecomposeResult;

/// Rasterizes a file (SVG, raster image or `.icon` bundle) to RGBA pixels.
///
/// Implementations either return an image or a clearly distinguishable error; they never
/// fabricate a placeholder.
pub trait Renderer {
    /// Render `path` to a `size`x`size` straight-alpha RGBA image.
    fn render(&self, path: &Path, size: u32) -> RecomposeResult<image::RgbaImage>;
}

/// Extracts per-layer files from a compiled catalog.
pub trait Extractor {
    /// Extract every file of `source` into `out_dir` and list the assets written.
    fn extract(&self, source: &Path, out_dir: &Path) -> RecomposeResult<Vec<AssetFile>>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, path: &Path, size: u32) -> RecomposeResult<image::RgbaImage> {
        (**self).render(path, size)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, path: &Path, size: u32) -> RecomposeResult<image::RgbaImage> {
        (**self).render(path, size)
    }
}
