//! Output module for Orb-Weaver
//!
//! End-of-operation reporting for the CLI and embedding callers.

mod summary;

pub use summary::{print_summary, summarize, OperationSummary};
