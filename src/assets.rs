//! Extracted-file handling: naming rules, matching to catalog layers, vector group merging.

pub mod files;
pub mod flatten;
pub mod resolver;
