//! Crawl strategies
//!
//! Four interchangeable traversal algorithms sharing one context: the
//! fetcher, the operation-scoped dedup registry, the concurrency controller,
//! the operation handle, and the outgoing record channel. Results stream as
//! they complete; cancellation is polled between units of work (per slot,
//! per batch, per level) and never interrupts an in-flight fetch.
//!
//! Individual URL failures are isolated: they accumulate as
//! `success: false` records and never abort a batch, level, or operation.
//! Only an unreachable start resource is fatal.

use crate::config::CrawlerConfig;
use crate::crawler::controller::Controller;
use crate::crawler::fetcher::{FetchResult, PageFetch};
use crate::crawler::parser::{extract_loc_values, extract_text_links};
use crate::state::{CrawlRecord, OperationHandle};
use crate::url::{normalize, DedupRegistry};
use crate::WeaverError;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Everything a strategy needs to run one operation
pub struct StrategyContext {
    pub fetcher: Arc<dyn PageFetch>,
    pub registry: Arc<DedupRegistry>,
    pub controller: Arc<Controller>,
    pub handle: Arc<OperationHandle>,
    pub crawler: CrawlerConfig,
    pub tx: mpsc::Sender<CrawlRecord>,
}

/// Progress range a sub-task reports within: `base..base+span` percent
#[derive(Debug, Clone, Copy)]
struct ProgressWindow {
    base: u8,
    span: u8,
}

impl ProgressWindow {
    fn at(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.base.saturating_add(self.span);
        }
        let fraction = done.min(total) as u64 * self.span as u64 / total as u64;
        self.base.saturating_add(fraction as u8)
    }
}

/// Appends a record to the operation log and streams it downstream
///
/// A dropped receiver is not an error; records stay available on the
/// operation handle.
async fn emit(ctx: &StrategyContext, level: u32, page: FetchResult) -> CrawlRecord {
    let record = CrawlRecord { level, page };
    ctx.handle.push_record(record.clone());
    let _ = ctx.tx.send(record.clone()).await;
    record
}

/// One fetch slot: waits for a dispatcher permit, fetches, streams
///
/// Slots that have not started when cancellation fires are skipped; a slot
/// already fetching runs to completion.
async fn fetch_one(ctx: &StrategyContext, url: Url, level: u32) -> Option<CrawlRecord> {
    if ctx.handle.is_cancelled() {
        return None;
    }

    let _permit = ctx.controller.pages().acquire().await;

    if ctx.handle.is_cancelled() {
        return None;
    }

    let page = ctx.fetcher.fetch(&url).await;
    if !page.success {
        tracing::warn!(
            url = %url,
            error = page.error.as_deref().unwrap_or("unknown"),
            "page failed, continuing"
        );
    }

    Some(emit(ctx, level, page).await)
}

/// Batch traversal: fixed-size batches through the page dispatcher
///
/// Returns the records produced by this invocation (they have also been
/// streamed already). Completion order within a batch is unspecified.
async fn run_batch(
    ctx: &StrategyContext,
    urls: Vec<Url>,
    level: u32,
    window: ProgressWindow,
) -> Vec<CrawlRecord> {
    let total = urls.len();
    let concurrency = ctx.controller.pages().limit();
    let mut records = Vec::with_capacity(total);
    let mut processed = 0usize;

    for chunk in urls.chunks(ctx.crawler.batch_size) {
        if ctx.handle.is_cancelled() {
            tracing::info!(level, "cancelled between batches");
            break;
        }

        ctx.handle.report(
            &format!("level {}", level),
            window.at(processed, total),
            &format!("{} of {} URLs", processed, total),
        );

        let batch: Vec<Option<CrawlRecord>> = stream::iter(chunk.iter().cloned())
            .map(|url| fetch_one(ctx, url, level))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        processed += chunk.len();
        records.extend(batch.into_iter().flatten());
    }

    ctx.handle.report(
        &format!("level {}", level),
        window.at(processed, total),
        "",
    );

    records
}

/// Single-page strategy: one fetch, optional link recording for downstream
pub async fn run_single_page(
    ctx: &StrategyContext,
    seed: Url,
    prefetched: Option<FetchResult>,
) -> Result<(), WeaverError> {
    ctx.registry.register_seed(&seed);
    ctx.handle.report("fetching", 10, seed.as_str());

    let page = match prefetched {
        Some(page) => page,
        None => {
            let _permit = ctx.controller.pages().acquire().await;
            ctx.fetcher.fetch(&seed).await
        }
    };

    if !page.success {
        return Err(WeaverError::StartUnreachable {
            url: seed.to_string(),
            reason: page.error.unwrap_or_else(|| "fetch failed".to_string()),
        });
    }

    for link in &page.internal_links {
        if let Ok(normalized) = normalize(link, &seed) {
            ctx.registry.claim(&normalized, 1);
        }
    }

    emit(ctx, 0, page).await;
    Ok(())
}

/// Recursive strategy: breadth-first, level N never starts before level N-1
/// has fully completed
pub async fn run_recursive(
    ctx: &StrategyContext,
    seed: Url,
    prefetched: Option<FetchResult>,
) -> Result<(), WeaverError> {
    let target = ctx.handle.target().clone();
    ctx.registry.register_seed(&seed);

    let mut level: u32 = 0;
    let mut records = match prefetched {
        Some(page) => vec![emit(ctx, 0, page).await],
        None => {
            run_batch(
                ctx,
                vec![seed.clone()],
                0,
                level_window(0, target.max_depth),
            )
            .await
        }
    };

    if !ctx.handle.is_cancelled() && !records.iter().any(|r| r.page.success) {
        let reason = records
            .iter()
            .find_map(|r| r.page.error.clone())
            .unwrap_or_else(|| "seed fetch failed".to_string());
        return Err(WeaverError::StartUnreachable {
            url: seed.to_string(),
            reason,
        });
    }

    loop {
        let next_level = level + 1;
        if next_level >= target.max_depth {
            tracing::info!(level, "depth limit reached");
            break;
        }
        if ctx.handle.is_cancelled() {
            break;
        }

        // Discover the next level: normalize, filter, claim. Only claimed
        // (previously-unseen) URLs are enqueued.
        let mut next_urls = Vec::new();
        for record in &records {
            if !record.page.success {
                continue;
            }
            let Ok(base) = Url::parse(&record.page.url) else {
                continue;
            };
            for link in &record.page.internal_links {
                let normalized = match normalize(link, &base) {
                    Ok(normalized) => normalized,
                    Err(e) => {
                        tracing::debug!(link, error = %e, "dropping malformed link");
                        continue;
                    }
                };
                if target.is_excluded(normalized.as_str()) {
                    continue;
                }
                if ctx.registry.claim(&normalized, next_level) {
                    next_urls.push(normalized);
                }
            }
        }

        if next_urls.is_empty() {
            tracing::info!(level = next_level, "no newly-claimed URLs, traversal complete");
            break;
        }

        if next_urls.len() > target.max_urls_per_level {
            tracing::debug!(
                level = next_level,
                claimed = next_urls.len(),
                cap = target.max_urls_per_level,
                "level capped"
            );
            next_urls.truncate(target.max_urls_per_level);
        }

        if ctx.handle.is_cancelled() {
            break;
        }

        records = run_batch(
            ctx,
            next_urls,
            next_level,
            level_window(next_level, target.max_depth),
        )
        .await;
        level = next_level;
    }

    Ok(())
}

fn level_window(level: u32, max_depth: u32) -> ProgressWindow {
    let span = (100 / max_depth.max(1)) as u8;
    ProgressWindow {
        base: span.saturating_mul(level as u8),
        span,
    }
}

/// Sitemap strategy: parse `<loc>` values, delegate to Batch at level 0
pub async fn run_sitemap(ctx: &StrategyContext, seed: Url) -> Result<(), WeaverError> {
    ctx.handle.report("sitemap", 2, seed.as_str());

    let xml = ctx
        .fetcher
        .fetch_raw(&seed)
        .await
        .map_err(|e| WeaverError::StartUnreachable {
            url: seed.to_string(),
            reason: e.to_string(),
        })?;

    let target = ctx.handle.target().clone();
    let mut urls = Vec::new();
    for loc in extract_loc_values(&xml) {
        let Ok(normalized) = normalize(&loc, &seed) else {
            tracing::debug!(loc, "dropping malformed sitemap entry");
            continue;
        };
        if target.is_excluded(normalized.as_str()) {
            continue;
        }
        if ctx.registry.claim(&normalized, 0) {
            urls.push(normalized);
        }
    }

    if urls.len() > target.max_urls_per_level {
        urls.truncate(target.max_urls_per_level);
    }

    tracing::info!(count = urls.len(), sitemap = %seed, "sitemap URLs collected");

    if ctx.handle.is_cancelled() {
        return Ok(());
    }

    run_batch(ctx, urls, 0, ProgressWindow { base: 5, span: 95 }).await;
    Ok(())
}

/// Link-collection strategy: the collection file is the level-0 record, its
/// links are fetched as level 1 through Batch
pub async fn run_link_collection(
    ctx: &StrategyContext,
    seed: Url,
    prefetched: Option<FetchResult>,
) -> Result<(), WeaverError> {
    ctx.registry.register_seed(&seed);
    ctx.handle.report("link collection", 2, seed.as_str());

    let page = match prefetched {
        Some(page) => page,
        None => {
            let _permit = ctx.controller.pages().acquire().await;
            ctx.fetcher.fetch(&seed).await
        }
    };

    if !page.success {
        return Err(WeaverError::StartUnreachable {
            url: seed.to_string(),
            reason: page.error.unwrap_or_else(|| "fetch failed".to_string()),
        });
    }

    let links = extract_text_links(&page.markdown);
    emit(ctx, 0, page).await;

    let target = ctx.handle.target().clone();
    let mut urls = Vec::new();
    for link in links {
        let Ok(normalized) = normalize(&link, &seed) else {
            continue;
        };
        if target.is_excluded(normalized.as_str()) {
            continue;
        }
        if ctx.registry.claim(&normalized, 1) {
            urls.push(normalized);
        }
    }

    if urls.len() > target.max_urls_per_level {
        urls.truncate(target.max_urls_per_level);
    }

    tracing::info!(count = urls.len(), collection = %seed, "collection links extracted");

    if ctx.handle.is_cancelled() {
        return Ok(());
    }

    run_batch(ctx, urls, 1, ProgressWindow { base: 5, span: 95 }).await;
    Ok(())
}
