//! CyberSafe Core
//!
//! Core types, traits, and utilities shared across CyberSafe components.
//!
//! This crate provides:
//! - The event data model and the `SensitiveText` holder for raw text
//! - Risk categories, score results and locally derived severity
//! - Error types and result handling
//! - Pipeline configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use types::{CategoryScore, Event, EventTicket, RiskCategory, ScoreResult, SensitiveText, Severity};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        CategoryScore, Event, EventTicket, RiskCategory, ScoreResult, SensitiveText, Severity,
    };
}
