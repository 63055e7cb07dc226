//! Rendering and extraction collaborators, plus the SVG export of documents.

pub mod backend;
pub mod command;
pub mod native;
pub mod svg_export;

pub use backend::{Extractor, Renderer};
pub use command::{CommandExtractor, CommandRenderer};
pub use native::NativeRenderer;
