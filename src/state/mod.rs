//! Operation state tracking for Orb-Weaver
//!
//! Defines the operation lifecycle, the crawl target description, the
//! level-tagged record stream, and the progress/cancellation tracker.

mod operation;
mod tracker;

pub use operation::{CrawlOperation, CrawlRecord, CrawlTarget, OperationState, TargetKind};
pub use tracker::{OperationHandle, OperationTracker};
