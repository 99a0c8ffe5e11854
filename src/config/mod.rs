//! Configuration module for Orb-Weaver
//!
//! Handles loading, parsing, and validating TOML configuration files. All
//! values have sensible defaults, so an absent or empty file yields a
//! working configuration.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, UserAgentConfig, WaitProfileEntry, WorkerBudget};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
