//! Catalog model: typed entries, colors, and the recovered group/layer structure.

pub mod color;
pub mod entry;
pub mod model;
