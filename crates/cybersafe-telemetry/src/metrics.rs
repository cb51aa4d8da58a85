//! Metrics collection and reporting

use cybersafe_core::Severity;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why an event ended without a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Entry already expired or claimed
    NotFound,
    /// Classifier port not ready
    NotReady,
    /// A model returned an error
    Scoring,
    /// Egress failed or timed out
    Report,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotReady => "not_ready",
            Self::Scoring => "scoring",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics collector for the inference pipeline.
///
/// Every update is also forwarded to the `metrics` facade, so an installed
/// exporter sees the same numbers.
#[derive(Clone)]
pub struct PipelineMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    ingested: AtomicU64,
    queued: AtomicU64,
    skipped_empty: AtomicU64,
    skipped_inactive: AtomicU64,
    reported: AtomicU64,
    dropped_not_found: AtomicU64,
    dropped_not_ready: AtomicU64,
    dropped_scoring: AtomicU64,
    dropped_report: AtomicU64,
    purged: AtomicU64,
    inference_latency_us: AtomicU64,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record an `ingest` call
    pub fn record_ingested(&self) {
        self.inner.ingested.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cybersafe_ingested_total").increment(1);
    }

    /// Record an event handed to the inference queue
    pub fn record_queued(&self) {
        self.inner.queued.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cybersafe_events_total", "outcome" => "queued").increment(1);
    }

    /// Record an event rejected because its text was empty
    pub fn record_skipped_empty(&self) {
        self.inner.skipped_empty.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cybersafe_events_total", "outcome" => "skipped_empty").increment(1);
    }

    /// Record an event rejected because the pipeline was not active
    pub fn record_skipped_inactive(&self) {
        self.inner.skipped_inactive.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cybersafe_events_total", "outcome" => "skipped_inactive").increment(1);
    }

    /// Record a successful report
    pub fn record_reported(&self, severity: Severity) {
        self.inner.reported.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "cybersafe_events_total",
            "outcome" => "reported",
            "severity" => severity.as_str()
        )
        .increment(1);
    }

    /// Record an event that ended without a report
    pub fn record_dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::NotFound => &self.inner.dropped_not_found,
            DropReason::NotReady => &self.inner.dropped_not_ready,
            DropReason::Scoring => &self.inner.dropped_scoring,
            DropReason::Report => &self.inner.dropped_report,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        metrics::counter!(
            "cybersafe_events_total",
            "outcome" => "dropped",
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    /// Record a buffered entry removed by its TTL timer
    pub fn record_purged(&self) {
        self.inner.purged.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cybersafe_purged_total").increment(1);
    }

    /// Record claim-to-scores latency for one event
    pub fn record_inference_latency(&self, latency_us: u64) {
        self.inner
            .inference_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        metrics::histogram!("cybersafe_inference_latency_us").record(latency_us as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        MetricsSnapshot {
            ingested: load(&self.inner.ingested),
            queued: load(&self.inner.queued),
            skipped_empty: load(&self.inner.skipped_empty),
            skipped_inactive: load(&self.inner.skipped_inactive),
            reported: load(&self.inner.reported),
            dropped_not_found: load(&self.inner.dropped_not_found),
            dropped_not_ready: load(&self.inner.dropped_not_ready),
            dropped_scoring: load(&self.inner.dropped_scoring),
            dropped_report: load(&self.inner.dropped_report),
            purged: load(&self.inner.purged),
            inference_latency_us: load(&self.inner.inference_latency_us),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ingested: u64,
    pub queued: u64,
    pub skipped_empty: u64,
    pub skipped_inactive: u64,
    pub reported: u64,
    pub dropped_not_found: u64,
    pub dropped_not_ready: u64,
    pub dropped_scoring: u64,
    pub dropped_report: u64,
    pub purged: u64,
    pub inference_latency_us: u64,
}

impl MetricsSnapshot {
    /// Events that reached a terminal state in the worker
    pub fn completed(&self) -> u64 {
        self.reported + self.dropped()
    }

    /// Events dropped in the worker, for any reason
    pub fn dropped(&self) -> u64 {
        self.dropped_not_found + self.dropped_not_ready + self.dropped_scoring + self.dropped_report
    }

    /// Average inference latency per scored event
    pub fn avg_inference_latency_us(&self) -> u64 {
        let scored = self.reported + self.dropped_report;
        if scored == 0 {
            0
        } else {
            self.inference_latency_us / scored
        }
    }
}
