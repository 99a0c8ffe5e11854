//! URL handling module for Orb-Weaver
//!
//! Provides URL normalization (the basis of the dedup key), host helpers,
//! and the per-operation deduplication registry.

mod domain;
mod normalize;
mod registry;

pub use domain::{extract_host, is_same_host};
pub use normalize::normalize;
pub use registry::{DedupRegistry, DedupStats};
