//! Concurrency controller
//!
//! Three independent bounding primitives, always applied together:
//! - an operation admission gate (how many operations run system-wide)
//! - a page dispatcher (in-flight fetches within one operation)
//! - a CPU worker pool (concurrent CPU-bound parsing)
//!
//! All three are advisory limits backed by semaphores; violating them causes
//! slowdown, not incorrectness. A background tuner samples memory and CPU
//! and throttles the page dispatcher and CPU pool under pressure, restoring
//! the configured limits when pressure subsides.

use crate::config::WorkerBudget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// A semaphore whose effective limit can drop to a reduced value and later
/// recover
///
/// Shrinking forgets permits as they free up, so in-flight work is never
/// aborted; only new acquisitions see the reduced limit. Restoring while a
/// shrink is still draining transiently over-provisions, then converges.
#[derive(Debug)]
pub struct AdaptiveLimiter {
    semaphore: Arc<Semaphore>,
    configured: usize,
    reduced: usize,
    throttled: AtomicBool,
}

impl AdaptiveLimiter {
    pub fn new(configured: usize, reduced: usize) -> Self {
        let reduced = reduced.clamp(1, configured);
        Self {
            semaphore: Arc::new(Semaphore::new(configured)),
            configured,
            reduced,
            throttled: AtomicBool::new(false),
        }
    }

    /// Waits for a slot under the current effective limit
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore never closes")
    }

    /// Drops the effective limit to the reduced value
    pub fn throttle(&self) {
        if self.throttled.swap(true, Ordering::SeqCst) {
            return;
        }
        let delta = (self.configured - self.reduced) as u32;
        if delta == 0 {
            return;
        }
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            if let Ok(permits) = semaphore.acquire_many_owned(delta).await {
                permits.forget();
            }
        });
    }

    /// Restores the configured limit
    pub fn restore(&self) {
        if !self.throttled.swap(false, Ordering::SeqCst) {
            return;
        }
        let delta = self.configured - self.reduced;
        if delta > 0 {
            self.semaphore.add_permits(delta);
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.throttled.load(Ordering::SeqCst)
    }

    /// The configured (unthrottled) limit
    pub fn limit(&self) -> usize {
        self.configured
    }

    /// Permits currently available for new work
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// The three-tier resource-bounding mechanism shared by all strategies
#[derive(Debug)]
pub struct Controller {
    operations: Arc<Semaphore>,
    pages: Arc<AdaptiveLimiter>,
    cpu: Arc<AdaptiveLimiter>,
    memory_threshold_percent: u8,
    cpu_threshold_percent: u8,
}

impl Controller {
    pub fn new(budget: &WorkerBudget) -> Self {
        let cpu_workers = if budget.max_cpu_workers == 0 {
            num_cpus::get()
        } else {
            budget.max_cpu_workers
        };

        let pages = budget.max_pages_per_operation;

        Self {
            operations: Arc::new(Semaphore::new(budget.max_operations)),
            pages: Arc::new(AdaptiveLimiter::new(pages, (pages / 2).max(1))),
            cpu: Arc::new(AdaptiveLimiter::new(cpu_workers, (cpu_workers / 2).max(1))),
            memory_threshold_percent: budget.memory_threshold_percent,
            cpu_threshold_percent: budget.cpu_threshold_percent,
        }
    }

    /// Waits for an operation slot; the permit is held for the operation's
    /// lifetime
    pub async fn admit_operation(&self) -> OwnedSemaphorePermit {
        self.operations
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore never closes")
    }

    /// The page dispatcher gating in-flight fetches
    pub fn pages(&self) -> Arc<AdaptiveLimiter> {
        self.pages.clone()
    }

    /// The CPU worker pool gating blocking parse work
    pub fn cpu(&self) -> Arc<AdaptiveLimiter> {
        self.cpu.clone()
    }

    /// Spawns the background sampling task driving throttle transitions
    pub fn spawn_tuner(self: &Arc<Self>, sample_interval: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut system = System::new();
            let mut interval = tokio::time::interval(sample_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                system.refresh_memory();
                system.refresh_cpu_usage();
                controller.apply_sample(
                    memory_percent(&system),
                    system.global_cpu_info().cpu_usage(),
                );
            }
        })
    }

    /// Applies one resource sample to the adaptive limits
    fn apply_sample(&self, memory_percent: f32, cpu_percent: f32) {
        if memory_percent >= self.memory_threshold_percent as f32 {
            if !self.pages.is_throttled() {
                tracing::warn!(
                    memory_percent,
                    "memory pressure, throttling page dispatcher"
                );
            }
            self.pages.throttle();
        } else {
            if self.pages.is_throttled() {
                tracing::info!(memory_percent, "memory pressure cleared");
            }
            self.pages.restore();
        }

        let cpu_pressured = cpu_percent >= self.cpu_threshold_percent as f32
            || memory_percent >= self.memory_threshold_percent as f32;
        if cpu_pressured {
            self.cpu.throttle();
        } else {
            self.cpu.restore();
        }
    }
}

fn memory_percent(system: &System) -> f32 {
    let total = system.total_memory();
    if total == 0 {
        return 0.0;
    }
    system.used_memory() as f32 / total as f32 * 100.0
}
