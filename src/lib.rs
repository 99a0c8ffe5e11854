//! Orb-Weaver: a concurrent crawl-orchestration engine
//!
//! This crate decides how to fetch a target (single page, sitemap, recursive
//! site walk, or link-collection file), fetches pages with bounded
//! parallelism, deduplicates discovered URLs across traversal levels, and
//! reports progress and cancellation to callers.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Orb-Weaver operations
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Could not classify crawl target {url}: {reason}")]
    Classify { url: String, reason: String },

    #[error("Start resource unreachable after all attempts: {url}: {reason}")]
    StartUnreachable { url: String, reason: String },

    #[error("Unknown operation: {0}")]
    OperationNotFound(uuid::Uuid),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
///
/// These fail fast: a malformed URL is dropped by the caller, never retried.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Fetch-specific errors, retried per the fetcher's backoff policy before
/// surfacing inside a failed `FetchResult`
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Content too short for {url}: {length} chars")]
    ContentTooShort { url: String, length: usize },
}

/// Result type alias for Orb-Weaver operations
pub type Result<T> = std::result::Result<T, WeaverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, FetchResult, PageFetch, PageFetcher};
pub use state::{CrawlOperation, CrawlRecord, CrawlTarget, OperationState, TargetKind};
pub use url::{normalize, DedupRegistry, DedupStats};
