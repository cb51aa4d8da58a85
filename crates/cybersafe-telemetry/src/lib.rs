//! CyberSafe Telemetry
//!
//! Everything that leaves the inference worker:
//! - Score-only egress to the remote collector
//! - Pipeline metrics and monitoring

pub mod egress;
pub mod metrics;

pub use egress::{CollectorPayload, CollectorResponse, HttpReporter, LogReporter, ScoreReporter};
pub use metrics::{DropReason, MetricsSnapshot, PipelineMetrics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::egress::{HttpReporter, LogReporter, ScoreReporter};
    pub use crate::metrics::{DropReason, PipelineMetrics};
}
