//! Per-operation deduplication registry
//!
//! Tracks every normalized URL an operation has seen, together with the
//! breadth-first level it was first discovered at. The registry is scoped to
//! a single operation and handed to that operation's strategy; it is never a
//! process-wide global, so concurrent operations cannot interfere with each
//! other.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

/// Deduplication statistics for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    /// Number of discovered-link claims made against the registry
    pub total_considered: u64,

    /// Number of distinct normalized URLs recorded (seeds included)
    pub unique: u64,

    /// `total_considered - unique` claims that were rejected as duplicates
    pub duplicates: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    seen: HashSet<String>,
    by_level: HashMap<u32, HashSet<String>>,
    considered: u64,
}

/// Set of normalized URLs already seen by one operation, keyed by level
///
/// Membership check and insertion are a single test-and-set under one lock;
/// two concurrent fetchers can never both claim the same URL. Levels are
/// assigned strictly first-discovery-wins: a URL reachable from two levels
/// is recorded at whichever level's claim landed first.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    inner: Mutex<RegistryInner>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims a URL for the given level
    ///
    /// Returns `true` and records the URL only if it was not previously seen
    /// at any level. Every call counts toward `total_considered`.
    pub fn claim(&self, url: &Url, level: u32) -> bool {
        let key = url.as_str().to_string();
        let mut inner = self.inner.lock().unwrap();
        inner.considered += 1;
        if inner.seen.insert(key.clone()) {
            inner.by_level.entry(level).or_default().insert(key);
            true
        } else {
            false
        }
    }

    /// Records a seed URL at level 0 without counting it as a discovery
    ///
    /// Seeds are supplied by the caller, not discovered from page links, so
    /// they are excluded from the considered/duplicate accounting.
    pub fn register_seed(&self, url: &Url) -> bool {
        let key = url.as_str().to_string();
        let mut inner = self.inner.lock().unwrap();
        if inner.seen.insert(key.clone()) {
            inner.by_level.entry(0).or_default().insert(key);
            true
        } else {
            false
        }
    }

    /// Returns whether the URL has been seen at any level
    pub fn contains(&self, url: &Url) -> bool {
        self.inner.lock().unwrap().seen.contains(url.as_str())
    }

    /// Returns deduplication statistics for observability
    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.lock().unwrap();
        let unique = inner.seen.len() as u64;
        DedupStats {
            total_considered: inner.considered,
            unique,
            duplicates: inner.considered.saturating_sub(unique),
        }
    }

    /// Returns `(level, url count)` pairs sorted by level
    pub fn level_counts(&self) -> Vec<(u32, usize)> {
        let inner = self.inner.lock().unwrap();
        let mut counts: Vec<(u32, usize)> = inner
            .by_level
            .iter()
            .map(|(level, urls)| (*level, urls.len()))
            .collect();
        counts.sort_by_key(|(level, _)| *level);
        counts
    }

    /// Total number of distinct URLs recorded
    pub fn unique_count(&self) -> usize {
        self.inner.lock().unwrap().seen.len()
    }
}
