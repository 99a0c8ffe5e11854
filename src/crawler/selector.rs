//! Strategy selector
//!
//! Classifies a crawl target into the traversal strategy that will handle
//! it. The rules are deterministic and applied in order:
//!
//! 1. path ends in `sitemap.xml` -> Sitemap
//! 2. filename is a known link-collection name -> LinkCollection
//! 3. path ends in `.txt`/`.md` -> one preliminary fetch; link density above
//!    2% with more than 3 links -> LinkCollection, otherwise fall through
//! 4. otherwise RecursiveSite when `max_depth > 1`, else SinglePage
//!
//! The preliminary fetch of rule 3 is reused as the operation's first
//! record, not discarded.

use crate::crawler::fetcher::{FetchResult, PageFetch};
use crate::crawler::parser::extract_text_links;
use crate::state::{CrawlTarget, TargetKind};
use crate::WeaverError;
use std::sync::Arc;
use url::Url;

/// Filenames that are link collections by convention
const LINK_COLLECTION_NAMES: &[&str] = &["llms.txt", "llms-full.txt", "links.txt", "urls.txt"];

/// Minimum link share of the content for the density rule
const LINK_DENSITY_THRESHOLD: f64 = 0.02;

/// Minimum absolute link count for the density rule
const LINK_COUNT_THRESHOLD: usize = 3;

/// Classification outcome: the resolved kind plus the preliminary fetch
/// result when one was needed
#[derive(Debug)]
pub struct Classification {
    pub kind: TargetKind,
    pub prefetched: Option<FetchResult>,
}

/// Classifies a target, fetching it once if the link-density rule requires
/// content
///
/// A forced `target.kind` short-circuits every rule. A preliminary fetch
/// that fails after all retries is an operation-fatal classification error.
pub async fn classify(
    fetcher: &Arc<dyn PageFetch>,
    seed: &Url,
    target: &CrawlTarget,
) -> Result<Classification, WeaverError> {
    if let Some(kind) = target.kind {
        return Ok(Classification {
            kind,
            prefetched: None,
        });
    }

    if let Some(kind) = classify_by_url(seed, target.max_depth) {
        return Ok(Classification {
            kind,
            prefetched: None,
        });
    }

    // A .txt/.md path with an unknown name: fetch it to measure link density
    let prefetched = fetcher.fetch(seed).await;
    if !prefetched.success {
        return Err(WeaverError::Classify {
            url: seed.to_string(),
            reason: prefetched
                .error
                .unwrap_or_else(|| "preliminary fetch failed".to_string()),
        });
    }

    let (links, density) = link_density(&prefetched.markdown);
    let kind = if links > LINK_COUNT_THRESHOLD && density > LINK_DENSITY_THRESHOLD {
        TargetKind::LinkCollection
    } else {
        fallback_kind(target.max_depth)
    };

    tracing::debug!(url = %seed, links, density, kind = %kind, "density classification");

    Ok(Classification {
        kind,
        prefetched: Some(prefetched),
    })
}

/// Applies the fetch-free rules; `None` means a preliminary fetch is needed
pub fn classify_by_url(seed: &Url, max_depth: u32) -> Option<TargetKind> {
    let path = seed.path().to_lowercase();

    if path.ends_with("sitemap.xml") {
        return Some(TargetKind::Sitemap);
    }

    let filename = path.rsplit('/').next().unwrap_or("");
    if LINK_COLLECTION_NAMES.contains(&filename) {
        return Some(TargetKind::LinkCollection);
    }

    if path.ends_with(".txt") || path.ends_with(".md") {
        // Needs content to decide
        return None;
    }

    Some(fallback_kind(max_depth))
}

fn fallback_kind(max_depth: u32) -> TargetKind {
    if max_depth > 1 {
        TargetKind::RecursiveSite
    } else {
        TargetKind::SinglePage
    }
}

/// Counts absolute links in text and their share of all whitespace tokens
pub fn link_density(text: &str) -> (usize, f64) {
    let tokens = text.split_whitespace().count();
    if tokens == 0 {
        return (0, 0.0);
    }
    let links = extract_text_links(text).len();
    (links, links as f64 / tokens as f64)
}
