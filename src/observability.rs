//! Observability: tracing setup and pipeline counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for recording pipeline counters
#[derive(Debug, Default)]
pub struct Metrics {
    uploads_accepted: AtomicU64,
    uploads_rejected: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    regions_classified: AtomicU64,
    region_failures: AtomicU64,
    regions_skipped: AtomicU64,
    alerts_sent: AtomicU64,
    alerts_failed: AtomicU64,
}

fn bump(counter: &AtomicU64, name: &'static str) {
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(counter = name, "Metric incremented");
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_accepted(&self) {
        bump(&self.uploads_accepted, "uploads_accepted");
    }

    /// Upload turned away because every worker queue was full
    pub fn upload_rejected(&self) {
        bump(&self.uploads_rejected, "uploads_rejected");
    }

    pub fn job_completed(&self) {
        bump(&self.jobs_completed, "jobs_completed");
    }

    pub fn job_failed(&self) {
        bump(&self.jobs_failed, "jobs_failed");
    }

    pub fn region_classified(&self) {
        bump(&self.regions_classified, "regions_classified");
    }

    pub fn region_failed(&self) {
        bump(&self.region_failures, "region_failures");
    }

    pub fn region_skipped(&self) {
        bump(&self.regions_skipped, "regions_skipped");
    }

    pub fn alert_sent(&self) {
        bump(&self.alerts_sent, "alerts_sent");
    }

    pub fn alert_failed(&self) {
        bump(&self.alerts_failed, "alerts_failed");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_accepted: self.uploads_accepted.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            regions_classified: self.regions_classified.load(Ordering::Relaxed),
            region_failures: self.region_failures.load(Ordering::Relaxed),
            regions_skipped: self.regions_skipped.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uploads_accepted: u64,
    pub uploads_rejected: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub regions_classified: u64,
    pub region_failures: u64,
    pub regions_skipped: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.upload_accepted();
        metrics.upload_accepted();
        metrics.region_skipped();
        metrics.alert_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_accepted, 2);
        assert_eq!(snapshot.regions_skipped, 1);
        assert_eq!(snapshot.alerts_failed, 1);
        assert_eq!(snapshot.jobs_completed, 0);
    }
}
