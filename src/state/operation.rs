//! Operation state definitions
//!
//! An operation is one end-to-end crawl request, tracked from start to a
//! terminal state.

use crate::crawler::FetchResult;
use crate::url::DedupStats;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a crawl operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Operation is executing (includes waiting for admission)
    Running,

    /// Cancellation requested; in-flight fetches are draining
    Cancelling,

    /// Operation stopped cooperatively before completion
    Cancelled,

    /// Operation ran to completion (individual URLs may still have failed)
    Completed,

    /// Operation could not classify its target or reach its start resource
    Failed,
}

impl OperationState {
    /// Returns true once the operation will make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }

    /// Returns true while the operation may still produce records
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// How a crawl target should be traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// One page, no traversal
    SinglePage,

    /// sitemap.xml enumerating an explicit URL list
    Sitemap,

    /// Plain-text/markdown file that is mostly a list of links
    LinkCollection,

    /// Breadth-first walk following same-host links
    RecursiveSite,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SinglePage => "single-page",
            Self::Sitemap => "sitemap",
            Self::LinkCollection => "link-collection",
            Self::RecursiveSite => "recursive-site",
        };
        write!(f, "{}", name)
    }
}

/// Description of what to crawl, immutable once the operation starts
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    /// The URL or resource to crawl
    pub raw_url: String,

    /// Forced traversal kind; `None` lets the selector classify
    pub kind: Option<TargetKind>,

    /// Maximum depth for recursive traversal (1 = seed only)
    pub max_depth: u32,

    /// Maximum URLs fetched per depth level
    pub max_urls_per_level: usize,

    /// Substring patterns; matching URLs are skipped entirely
    pub exclude_patterns: Vec<String>,
}

impl CrawlTarget {
    pub fn new(raw_url: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            kind: None,
            max_depth: 3,
            max_urls_per_level: 50,
            exclude_patterns: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_urls_per_level(mut self, max_urls: usize) -> Self {
        self.max_urls_per_level = max_urls;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Returns true when the URL matches any exclude pattern
    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude_patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

/// One fetch outcome tagged with the breadth-first level it belongs to
///
/// This is the unit streamed to downstream consumers; storage and embedding
/// consume records independently, no batching contract.
#[derive(Debug, Clone)]
pub struct CrawlRecord {
    /// Depth index the URL was fetched at, 0 for seeds
    pub level: u32,

    /// The fetch outcome
    pub page: FetchResult,
}

/// Point-in-time snapshot of an operation, returned by `poll`
#[derive(Debug, Clone)]
pub struct CrawlOperation {
    pub id: Uuid,
    pub target: CrawlTarget,
    /// Traversal kind after classification, `None` until resolved
    pub kind: Option<TargetKind>,
    pub state: OperationState,
    pub progress_percent: u8,
    pub stage: String,
    pub records: Vec<CrawlRecord>,
    pub error: Option<String>,
    /// Deduplication statistics, populated when the strategy finishes
    pub dedup: Option<DedupStats>,
    /// `(level, unique URL count)` pairs, populated with `dedup`
    pub level_counts: Vec<(u32, usize)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlOperation {
    /// Number of fetches attempted so far
    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    /// Number of successful fetches so far
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.page.success).count()
    }
}
