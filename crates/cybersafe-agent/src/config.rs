//! Agent configuration

use cybersafe_classifiers::{DeviceType, ModelSpec};
use cybersafe_core::{PipelineConfig, RiskCategory};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// One model source per risk category
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,

    /// Device models are loaded onto
    #[serde(default)]
    pub device: DeviceType,

    /// Remote collector; scores are only logged when absent
    #[serde(default)]
    pub collector: Option<CollectorConfig>,

    /// Prometheus exporter listen address
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}

impl AgentConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(url) = &cli.collector {
            config.collector = Some(CollectorConfig { url: url.clone() });
        }

        if let Some(addr) = cli.metrics_listen {
            config.metrics_listen = Some(addr);
        }

        config.pipeline.validate()?;
        Ok(config)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            models: default_models(),
            device: DeviceType::default(),
            collector: None,
            metrics_listen: None,
        }
    }
}

/// Collector endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Full URL scores are POSTed to
    pub url: String,
}

fn default_models() -> Vec<ModelSpec> {
    RiskCategory::defaults()
        .into_iter()
        .map(|category| {
            let path = format!("./models/{}.safetensors", category);
            ModelSpec::local(category, path)
        })
        .collect()
}
