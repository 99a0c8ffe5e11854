//! Crawl coordinator - operation orchestration
//!
//! The coordinator is the engine facade: it admits operations through the
//! controller's gate, classifies targets, dispatches the matching strategy,
//! and tracks every operation from start to terminal state. Callers get an
//! operation id plus a streaming record receiver, and interact through
//! `poll`/`cancel`/`release`.

use crate::config::Config;
use crate::crawler::controller::Controller;
use crate::crawler::fetcher::{build_http_client, PageFetch, PageFetcher};
use crate::crawler::selector::classify;
use crate::crawler::strategy::{
    run_link_collection, run_recursive, run_single_page, run_sitemap, StrategyContext,
};
use crate::state::{
    CrawlOperation, CrawlRecord, CrawlTarget, OperationHandle, OperationState, OperationTracker,
    TargetKind,
};
use crate::url::{normalize, DedupRegistry};
use crate::{UrlError, WeaverError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

const RECORD_CHANNEL_CAPACITY: usize = 64;

/// Engine facade exposing `start`, `poll`, `cancel`, and `release`
pub struct Coordinator {
    config: Arc<Config>,
    controller: Arc<Controller>,
    fetcher: Arc<dyn PageFetch>,
    tracker: Arc<OperationTracker>,
    tuner: JoinHandle<()>,
}

impl Coordinator {
    /// Creates a coordinator with the reqwest-backed fetcher
    pub fn new(config: Config) -> Result<Self, WeaverError> {
        let controller = Arc::new(Controller::new(&config.budget));
        let client = build_http_client(&config.user_agent)?;
        let fetcher: Arc<dyn PageFetch> =
            Arc::new(PageFetcher::new(client, &config, controller.cpu()));
        Ok(Self::with_fetcher(config, controller, fetcher))
    }

    /// Creates a coordinator around an existing fetcher (test seam)
    pub fn with_fetcher(
        config: Config,
        controller: Arc<Controller>,
        fetcher: Arc<dyn PageFetch>,
    ) -> Self {
        let tuner =
            controller.spawn_tuner(Duration::from_millis(config.budget.sample_interval_ms));
        Self {
            config: Arc::new(config),
            controller,
            fetcher,
            tracker: Arc::new(OperationTracker::new()),
            tuner,
        }
    }

    /// Starts a crawl operation, returning its id and the record stream
    ///
    /// Returns immediately; the operation waits for admission in stage
    /// "queued". Dropping the receiver is fine - records remain available
    /// through `poll`.
    pub fn start(&self, target: CrawlTarget) -> (Uuid, mpsc::Receiver<CrawlRecord>) {
        let handle = self.tracker.register(target);
        let id = handle.id();
        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);

        tracing::info!(operation = %id, url = %handle.target().raw_url, "operation accepted");

        let config = self.config.clone();
        let controller = self.controller.clone();
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            drive_operation(config, controller, fetcher, handle, tx).await;
        });

        (id, rx)
    }

    /// Returns a point-in-time snapshot of the operation
    pub fn poll(&self, id: Uuid) -> Result<CrawlOperation, WeaverError> {
        self.tracker
            .get(id)
            .map(|handle| handle.snapshot())
            .ok_or(WeaverError::OperationNotFound(id))
    }

    /// Requests cooperative cancellation of the operation
    pub fn cancel(&self, id: Uuid) -> Result<(), WeaverError> {
        self.tracker.cancel(id)
    }

    /// Removes a finished operation from the registry, returning its final
    /// snapshot
    pub fn release(&self, id: Uuid) -> Result<CrawlOperation, WeaverError> {
        self.tracker.release(id)
    }

    /// Polls until the operation reaches a terminal state
    pub async fn wait(&self, id: Uuid) -> Result<CrawlOperation, WeaverError> {
        loop {
            let snapshot = self.poll(id)?;
            if snapshot.state.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.tuner.abort();
    }
}

/// Runs one operation end to end: admission, classification, strategy,
/// finalization
async fn drive_operation(
    config: Arc<Config>,
    controller: Arc<Controller>,
    fetcher: Arc<dyn PageFetch>,
    handle: Arc<OperationHandle>,
    tx: mpsc::Sender<CrawlRecord>,
) {
    let token = handle.cancel_token();

    // Wait for the admission gate; a cancel while queued ends the operation
    // without any work
    let _admission = tokio::select! {
        permit = controller.admit_operation() => permit,
        _ = token.cancelled() => {
            handle.finish(OperationState::Cancelled, None);
            tracing::info!(operation = %handle.id(), "cancelled while queued");
            return;
        }
    };

    let result = run_operation(&config, controller, fetcher, &handle, tx).await;

    match result {
        Ok(()) => {
            if handle.is_cancelled() {
                handle.finish(OperationState::Cancelled, None);
                tracing::info!(operation = %handle.id(), "operation cancelled");
            } else {
                let snapshot = handle.snapshot();
                tracing::info!(
                    operation = %handle.id(),
                    succeeded = snapshot.succeeded(),
                    attempted = snapshot.attempted(),
                    "operation completed: {} of {} URLs succeeded",
                    snapshot.succeeded(),
                    snapshot.attempted()
                );
                handle.finish(OperationState::Completed, None);
            }
        }
        Err(e) => {
            if handle.is_cancelled() {
                handle.finish(OperationState::Cancelled, None);
            } else {
                tracing::error!(operation = %handle.id(), error = %e, "operation failed");
                handle.finish(OperationState::Failed, Some(e.to_string()));
            }
        }
    }
}

async fn run_operation(
    config: &Config,
    controller: Arc<Controller>,
    fetcher: Arc<dyn PageFetch>,
    handle: &Arc<OperationHandle>,
    tx: mpsc::Sender<CrawlRecord>,
) -> Result<(), WeaverError> {
    let target = handle.target().clone();

    let parsed = Url::parse(&target.raw_url)
        .map_err(|e| WeaverError::Url(UrlError::Parse(e.to_string())))?;
    let seed = normalize(parsed.as_str(), &parsed)?;

    handle.report("classifying", 1, seed.as_str());
    let classification = {
        // The preliminary density fetch counts against the page dispatcher
        // like any other fetch
        let _permit = controller.pages().acquire().await;
        classify(&fetcher, &seed, &target).await?
    };
    handle.set_kind(classification.kind);
    tracing::info!(
        operation = %handle.id(),
        kind = %classification.kind,
        "target classified"
    );

    let registry = Arc::new(DedupRegistry::new());
    let ctx = StrategyContext {
        fetcher,
        registry: registry.clone(),
        controller,
        handle: handle.clone(),
        crawler: config.crawler.clone(),
        tx,
    };

    let run_result = match classification.kind {
        TargetKind::SinglePage => {
            run_single_page(&ctx, seed, classification.prefetched).await
        }
        TargetKind::RecursiveSite => {
            run_recursive(&ctx, seed, classification.prefetched).await
        }
        TargetKind::Sitemap => run_sitemap(&ctx, seed).await,
        TargetKind::LinkCollection => {
            run_link_collection(&ctx, seed, classification.prefetched).await
        }
    };

    handle.set_dedup(registry.stats(), registry.level_counts());
    run_result
}
