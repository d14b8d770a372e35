//! In-process metrics: atomic counters with a snapshot type, no external
//! scrape endpoint (SPEC_FULL.md §2.1 Non-goals: no OTLP/Prometheus exporter).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    jobs_admitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    builds_in_flight: AtomicU64,
    rate_limit_rejections: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_admitted(&self) {
        self.jobs_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn build_started(&self) {
        self.builds_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn build_finished(&self) {
        self.builds_in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn rate_limit_rejected(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_admitted: self.jobs_admitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            builds_in_flight: self.builds_in_flight.load(Ordering::Relaxed),
            rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_admitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub builds_in_flight: u64,
    pub rate_limit_rejections: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = Metrics::new();
        metrics.job_admitted();
        metrics.job_admitted();
        metrics.job_completed();
        metrics.build_started();

        let snap = metrics.snapshot();
        assert_eq!(snap.jobs_admitted, 2);
        assert_eq!(snap.jobs_completed, 1);
        assert_eq!(snap.builds_in_flight, 1);
    }

    #[test]
    fn build_finished_decrements_in_flight() {
        let metrics = Metrics::new();
        metrics.build_started();
        metrics.build_started();
        metrics.build_finished();
        assert_eq!(metrics.snapshot().builds_in_flight, 1);
    }
}
