use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

use crate::campaign::errors::LifecycleError;

/// Lifecycle operation counters
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub campaigns_created: AtomicU64,
    pub transitions_committed: AtomicU64,
    pub conflicts: AtomicU64,
    pub rejected_requests: AtomicU64,
    pub deposits: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notification_failures: AtomicU64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.campaigns_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deposit(&self) {
        self.deposits.fetch_add(1, Ordering::Relaxed);
    }

    /// Conflicts are counted apart from other refusals
    pub fn record_error(&self, error: &LifecycleError) {
        match error {
            LifecycleError::Conflict { .. } => {
                self.conflicts.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.rejected_requests.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_notification(&self, delivered: bool) {
        if delivered {
            self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notification_failures.fetch_add(1, Ordering::Relaxed);
            warn!("Notification delivery failed");
        }
    }

    pub fn get_stats(&self) -> LifecycleStats {
        LifecycleStats {
            campaigns_created: self.campaigns_created.load(Ordering::Relaxed),
            transitions_committed: self.transitions_committed.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            deposits: self.deposits.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Lifecycle metrics: created={}, transitions={}, conflicts={}, rejected={}, deposits={}, notifications={}, notification_failures={}",
            stats.campaigns_created,
            stats.transitions_committed,
            stats.conflicts,
            stats.rejected_requests,
            stats.deposits,
            stats.notifications_sent,
            stats.notification_failures
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    pub campaigns_created: u64,
    pub transitions_committed: u64,
    pub conflicts: u64,
    pub rejected_requests: u64,
    pub deposits: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
}

/// Global metrics instance
static LIFECYCLE_METRICS: std::sync::LazyLock<LifecycleMetrics> =
    std::sync::LazyLock::new(LifecycleMetrics::new);

pub fn lifecycle_metrics() -> &'static LifecycleMetrics {
    &LIFECYCLE_METRICS
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
