//! Progress and cancellation tracking
//!
//! Each operation owns an `OperationHandle`: the mutable state a strategy
//! reports into and callers poll out of, plus the cancellation token the
//! strategy checks between units of work. The `OperationTracker` is the
//! coordinator's registry of live handles.

use crate::state::operation::{
    CrawlOperation, CrawlRecord, CrawlTarget, OperationState, TargetKind,
};
use crate::url::DedupStats;
use crate::WeaverError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug)]
struct HandleInner {
    kind: Option<TargetKind>,
    state: OperationState,
    stage: String,
    progress_percent: u8,
    records: Vec<CrawlRecord>,
    error: Option<String>,
    dedup: Option<DedupStats>,
    level_counts: Vec<(u32, usize)>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Mutable per-operation state shared between the coordinator, the running
/// strategy, and pollers
#[derive(Debug)]
pub struct OperationHandle {
    id: Uuid,
    target: CrawlTarget,
    inner: Mutex<HandleInner>,
    cancel: CancellationToken,
}

impl OperationHandle {
    pub fn new(target: CrawlTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            inner: Mutex::new(HandleInner {
                kind: None,
                state: OperationState::Running,
                stage: "queued".to_string(),
                progress_percent: 0,
                records: Vec::new(),
                error: None,
                dedup: None,
                level_counts: Vec::new(),
                started_at: Utc::now(),
                finished_at: None,
            }),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    /// Overwrites the operation's current stage and progress
    pub fn report(&self, stage: &str, percent: u8, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.stage = stage.to_string();
        inner.progress_percent = percent.min(100);
        if message.is_empty() {
            tracing::debug!(operation = %self.id, stage, percent, "progress");
        } else {
            tracing::debug!(operation = %self.id, stage, percent, message, "progress");
        }
    }

    /// Records the traversal kind once classification resolves it
    pub fn set_kind(&self, kind: TargetKind) {
        self.inner.lock().unwrap().kind = Some(kind);
    }

    /// Appends a fetch record to the operation log
    pub fn push_record(&self, record: CrawlRecord) {
        self.inner.lock().unwrap().records.push(record);
    }

    /// Stores final deduplication statistics for the snapshot
    pub fn set_dedup(&self, stats: DedupStats, level_counts: Vec<(u32, usize)>) {
        let mut inner = self.inner.lock().unwrap();
        inner.dedup = Some(stats);
        inner.level_counts = level_counts;
    }

    /// Token strategies watch between units of work
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Requests cooperative cancellation
    ///
    /// The state moves to `Cancelling`; the running strategy finishes only
    /// in-flight fetches, then the coordinator transitions to `Cancelled`.
    pub fn request_cancel(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = OperationState::Cancelling;
        }
        self.cancel.cancel();
        tracing::info!(operation = %self.id, "cancellation requested");
    }

    /// Moves the operation into a terminal state
    pub fn finish(&self, state: OperationState, error: Option<String>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state.is_terminal() {
            return;
        }
        inner.state = state;
        inner.error = error;
        inner.finished_at = Some(Utc::now());
        if state == OperationState::Completed {
            inner.progress_percent = 100;
        }
    }

    pub fn state(&self) -> OperationState {
        self.inner.lock().unwrap().state
    }

    /// Clones out a point-in-time snapshot for pollers
    pub fn snapshot(&self) -> CrawlOperation {
        let inner = self.inner.lock().unwrap();
        CrawlOperation {
            id: self.id,
            target: self.target.clone(),
            kind: inner.kind,
            state: inner.state,
            progress_percent: inner.progress_percent,
            stage: inner.stage.clone(),
            records: inner.records.clone(),
            error: inner.error.clone(),
            dedup: inner.dedup,
            level_counts: inner.level_counts.clone(),
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }
}

/// Registry of live operations keyed by id
#[derive(Debug, Default)]
pub struct OperationTracker {
    operations: Mutex<HashMap<Uuid, Arc<OperationHandle>>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a handle for a new operation
    pub fn register(&self, target: CrawlTarget) -> Arc<OperationHandle> {
        let handle = Arc::new(OperationHandle::new(target));
        self.operations
            .lock()
            .unwrap()
            .insert(handle.id(), handle.clone());
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<OperationHandle>> {
        self.operations.lock().unwrap().get(&id).cloned()
    }

    /// Requests cancellation of the identified operation
    pub fn cancel(&self, id: Uuid) -> Result<(), WeaverError> {
        let handle = self.get(id).ok_or(WeaverError::OperationNotFound(id))?;
        handle.request_cancel();
        Ok(())
    }

    /// Drops a terminal operation from the registry, returning its final
    /// snapshot
    pub fn release(&self, id: Uuid) -> Result<CrawlOperation, WeaverError> {
        let handle = self
            .operations
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(WeaverError::OperationNotFound(id))?;
        Ok(handle.snapshot())
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.operations.lock().unwrap().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_target() -> CrawlTarget {
        CrawlTarget::new("https://example.com/")
    }

    #[test]
    fn test_new_handle_is_running() {
        let handle = OperationHandle::new(test_target());
        assert_eq!(handle.state(), OperationState::Running);
        assert!(!handle.is_cancelled());
        assert_eq!(handle.snapshot().stage, "queued");
    }

    #[test]
    fn test_report_updates_snapshot() {
        let handle = OperationHandle::new(test_target());
        handle.report("level 1", 40, "fetching");

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.stage, "level 1");
        assert_eq!(snapshot.progress_percent, 40);
    }

    #[test]
    fn test_percent_clamped() {
        let handle = OperationHandle::new(test_target());
        handle.report("done", 250, "");
        assert_eq!(handle.snapshot().progress_percent, 100);
    }

    #[test]
    fn test_cancel_transitions_state() {
        let handle = OperationHandle::new(test_target());
        handle.request_cancel();
        assert_eq!(handle.state(), OperationState::Cancelling);
        assert!(handle.is_cancelled());

        handle.finish(OperationState::Cancelled, None);
        assert_eq!(handle.state(), OperationState::Cancelled);
    }

    #[test]
    fn test_finish_is_sticky() {
        let handle = OperationHandle::new(test_target());
        handle.finish(OperationState::Failed, Some("boom".to_string()));
        handle.finish(OperationState::Completed, None);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, OperationState::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_tracker_register_and_cancel() {
        let tracker = OperationTracker::new();
        let handle = tracker.register(test_target());
        let id = handle.id();

        assert!(tracker.get(id).is_some());
        tracker.cancel(id).unwrap();
        assert!(handle.is_cancelled());

        handle.finish(OperationState::Cancelled, None);
        let snapshot = tracker.release(id).unwrap();
        assert_eq!(snapshot.state, OperationState::Cancelled);
        assert!(tracker.get(id).is_none());
    }

    #[test]
    fn test_cancel_unknown_operation() {
        let tracker = OperationTracker::new();
        let result = tracker.cancel(Uuid::new_v4());
        assert!(matches!(result, Err(WeaverError::OperationNotFound(_))));
    }
}
