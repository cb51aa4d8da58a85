//! Error types for CyberSafe

/// Result type alias using CyberSafe's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CyberSafe operations
///
/// A claim on an absent or expired store entry is not represented here:
/// it is a normal skip, surfaced as `None` by the store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A risk model failed to load at startup
    #[error("failed to load {category} model: {reason}")]
    Load { category: String, reason: String },

    /// Feature encoder misconfiguration
    #[error("encoder error: {0}")]
    Encode(String),

    /// Egress to the score collector failed
    #[error("report error: {0}")]
    Report(String),

    /// The classifier port was used before a successful load or after release
    #[error("classifier port is not ready")]
    NotReady,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new load error for a risk category
    pub fn load(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            category: category.into(),
            reason: reason.into(),
        }
    }

    /// Create a new encoder error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new report error
    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must stop the pipeline from starting
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Encode(_) | Self::Config(_))
    }
}
