//! The `icon.json` document and its construction.

pub mod builder;
pub mod model;
