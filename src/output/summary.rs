//! Operation summary generation
//!
//! Renders an end-of-operation report from a `CrawlOperation` snapshot:
//! partial-success counts, deduplication statistics, and per-level URL
//! counts.

use crate::state::{CrawlOperation, OperationState};

/// Summary of one finished (or cancelled) operation
#[derive(Debug, Clone)]
pub struct OperationSummary {
    /// Terminal state the operation reached
    pub state: OperationState,

    /// URLs that produced a successful fetch
    pub succeeded: usize,

    /// URLs attempted in total
    pub attempted: usize,

    /// Dedup claims considered during traversal
    pub total_considered: u64,

    /// Distinct URLs recorded across all levels
    pub unique: u64,

    /// Claims rejected as duplicates
    pub duplicates: u64,

    /// `(level, unique URL count)` pairs
    pub level_counts: Vec<(u32, usize)>,

    /// Summary error for failed operations
    pub error: Option<String>,

    /// Wall-clock duration, when the operation has finished
    pub elapsed_secs: Option<f64>,
}

/// Builds a summary from an operation snapshot
pub fn summarize(operation: &CrawlOperation) -> OperationSummary {
    let (total_considered, unique, duplicates) = match operation.dedup {
        Some(stats) => (stats.total_considered, stats.unique, stats.duplicates),
        None => (0, 0, 0),
    };

    let elapsed_secs = operation.finished_at.map(|finished| {
        (finished - operation.started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    });

    OperationSummary {
        state: operation.state,
        succeeded: operation.succeeded(),
        attempted: operation.attempted(),
        total_considered,
        unique,
        duplicates,
        level_counts: operation.level_counts.clone(),
        error: operation.error.clone(),
        elapsed_secs,
    }
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &OperationSummary) {
    println!("=== Crawl Summary ===\n");

    println!("State: {}", summary.state);
    println!(
        "Pages: {} of {} URLs succeeded",
        summary.succeeded, summary.attempted
    );

    if let Some(elapsed) = summary.elapsed_secs {
        println!("Elapsed: {:.1}s", elapsed);
    }

    println!("\nDeduplication:");
    println!("  Links considered: {}", summary.total_considered);
    println!("  Unique URLs: {}", summary.unique);
    println!("  Duplicates skipped: {}", summary.duplicates);
    if summary.total_considered > 0 {
        let rate = summary.duplicates as f64 / summary.total_considered as f64 * 100.0;
        println!("  Dedup rate: {:.1}%", rate);
    }

    if !summary.level_counts.is_empty() {
        println!("\nURLs by level:");
        for (level, count) in &summary.level_counts {
            println!("  Level {}: {} URLs", level, count);
        }
    }

    if let Some(error) = &summary.error {
        println!("\nError: {}", error);
    }
}
