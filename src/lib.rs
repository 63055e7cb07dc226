//! Reconstruct editable layered icon documents (`.icon` bundles) from compiled asset
//! catalog dumps.
//!
//! The pipeline runs in five stages:
//! 1. [`catalog`] parses the raw catalog dump into a typed [`CatalogModel`].
//! 2. [`assets`] matches extracted files to catalog layers and copies them into `Assets/`.
//! 3. [`document`] builds the `icon.json` document.
//! 4. [`discrepancy`] records everything the document could not carry over.
//! 5. [`score`] compares renderings of the rebuilt icon against a reference.
//!
//! [`pipeline`] chains the stages; [`render`] holds the rasterizers they call.
#![forbid(unsafe_code)]

pub mod assets;
pub mod catalog;
pub mod discrepancy;
pub mod document;
pub mod foundation;
pub mod pipeline;
pub mod render;
pub mod score;

pub use assets::resolver::{ResolveOptions, ResolvedAssets, resolve_assets};
pub use catalog::model::CatalogModel;
pub use discrepancy::{DiscrepancyKind, DiscrepancyRecord, detect};
pub use document::builder::build_document;
pub use document::model::IconDocument;
pub use foundation::core::{Appearance, AppearanceValues, Canvas};
pub use foundation::error::{RecomposeError, RecomposeResult};
pub use pipeline::{AssetSource, BuildReport, PipelineOptions, build_bundle, score_bundle};
pub use render::{CommandExtractor, CommandRenderer, Extractor, NativeRenderer, Renderer};
pub use score::{FidelityScore, score_images};
