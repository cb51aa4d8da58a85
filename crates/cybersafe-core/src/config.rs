//! Pipeline configuration
//!
//! All values are fixed once the pipeline is initialized.

use crate::{Error, Result, RiskCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Configuration for the inference pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How long captured text may stay buffered, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Length of the feature vector fed to every model
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,

    /// Text beyond this many characters is ignored by the encoder
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Registered risk categories, in reporting order
    #[serde(default = "RiskCategory::defaults")]
    pub categories: Vec<RiskCategory>,

    /// Upper bound on a single egress attempt, in milliseconds
    #[serde(default = "default_report_timeout_ms")]
    pub report_timeout_ms: u64,
}

impl PipelineConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.ttl_secs == 0 {
            return Err(Error::config("ttl_secs must be greater than zero"));
        }
        if self.feature_dim == 0 {
            return Err(Error::config("feature_dim must be greater than zero"));
        }
        if self.max_text_chars == 0 {
            return Err(Error::config("max_text_chars must be greater than zero"));
        }
        if self.report_timeout_ms == 0 {
            return Err(Error::config("report_timeout_ms must be greater than zero"));
        }
        if self.categories.is_empty() {
            return Err(Error::config("at least one risk category is required"));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.as_str().is_empty() {
                return Err(Error::config("risk category names must not be empty"));
            }
            if !seen.insert(category) {
                return Err(Error::config(format!("duplicate risk category '{}'", category)));
            }
        }

        Ok(())
    }

    /// Buffer time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Egress timeout
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            feature_dim: default_feature_dim(),
            max_text_chars: default_max_text_chars(),
            categories: RiskCategory::defaults(),
            report_timeout_ms: default_report_timeout_ms(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    5
}

fn default_feature_dim() -> usize {
    128
}

fn default_max_text_chars() -> usize {
    4096
}

fn default_report_timeout_ms() -> u64 {
    5000
}
