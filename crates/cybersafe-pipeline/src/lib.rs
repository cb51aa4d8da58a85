//! CyberSafe Pipeline
//!
//! Wires the pieces together into the privacy-bounded inference path:
//!
//! ```text
//! ingest ──put──▶ EphemeralStore ◀──claim── InferenceExecutor ──▶ ScoreReporter
//!    │                (TTL purge)                 │
//!    └────────── ticket (id, source) ─── FIFO ────┘
//! ```
//!
//! - [`store`]: id → text map where every entry destroys itself after the TTL
//! - [`executor`]: one dedicated worker thread that owns the classifier port
//!   and processes tickets strictly in order
//! - [`pipeline`]: the host-facing lifecycle (`initialize`, `ingest`,
//!   `shutdown`)
//!
//! Only the ticket travels through the queue. Text stays in the store until
//! the worker claims it, and is dropped right after encoding.

pub mod executor;
pub mod pipeline;
pub mod store;

pub use executor::{InferenceExecutor, Stage};
pub use pipeline::{IngestStatus, Pipeline};
pub use store::EphemeralStore;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::pipeline::{IngestStatus, Pipeline};
    pub use crate::store::EphemeralStore;
}
