//! Model loading for Candle-based risk models

use crate::classifier::RiskModel;
use crate::linear::LinearRiskModel;
use candle_core::{Device, Tensor};
use cybersafe_core::{Error, Result, RiskCategory};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Name of the weight tensor inside a model file
pub const WEIGHT_TENSOR: &str = "weight";

/// Name of the optional bias tensor inside a model file
pub const BIAS_TENSOR: &str = "bias";

/// Where to load one category's model from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Risk category this model scores
    pub category: RiskCategory,

    /// Location of the weights
    #[serde(flatten)]
    pub source: ModelSource,
}

impl ModelSpec {
    /// Model read from a local safetensors file
    pub fn local(category: RiskCategory, path: impl Into<PathBuf>) -> Self {
        Self {
            category,
            source: ModelSource::LocalPath { path: path.into() },
        }
    }

    /// Model downloaded from the Hugging Face Hub
    pub fn hf(category: RiskCategory, repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            category,
            source: ModelSource::HuggingFace {
                repo_id: repo_id.into(),
                revision: None,
                filename: filename.into(),
            },
        }
    }
}

/// Source location for model weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    /// Load from local file system
    LocalPath { path: PathBuf },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        #[serde(default)]
        revision: Option<String>,
        filename: String,
    },
}

/// Device type for inference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize),
    /// Metal (Apple Silicon)
    Metal(usize),
}

/// Loads one risk model from its spec
pub trait ModelLoader: Send + Sync {
    /// Load the model for `spec`, checking it accepts `feature_dim` inputs
    fn load(&self, spec: &ModelSpec, feature_dim: usize) -> Result<Box<dyn RiskModel>>;
}

/// Loads [`LinearRiskModel`]s from safetensors files.
///
/// A file must contain a `weight` tensor with `feature_dim` elements and may
/// contain a one-element `bias` tensor.
#[derive(Debug, Clone, Default)]
pub struct SafeTensorsLoader {
    device: DeviceType,
}

impl SafeTensorsLoader {
    pub fn new(device: DeviceType) -> Self {
        Self { device }
    }

    /// Resolve model path from source
    fn resolve_model_path(spec: &ModelSpec) -> Result<PathBuf> {
        let category = spec.category.as_str();

        match &spec.source {
            ModelSource::LocalPath { path } => {
                if !path.exists() {
                    return Err(Error::load(category, format!("model file not found: {:?}", path)));
                }
                Ok(path.clone())
            }
            ModelSource::HuggingFace {
                repo_id,
                revision,
                filename,
            } => {
                let api = Api::new()
                    .map_err(|e| Error::load(category, format!("failed to initialize HF API: {}", e)))?;

                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                repo.get(filename)
                    .map_err(|e| Error::load(category, format!("failed to download model from HF: {}", e)))
            }
        }
    }

    /// Create Candle device from device type
    fn create_device(&self, category: &str) -> Result<Device> {
        match self.device {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::load(category, format!("failed to create CUDA device: {}", e))),
            DeviceType::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::load(category, format!("failed to create Metal device: {}", e))),
        }
    }

    fn read_bias(tensors: &mut HashMap<String, Tensor>, category: &str) -> Result<f32> {
        let Some(bias) = tensors.remove(BIAS_TENSOR) else {
            return Ok(0.0);
        };

        let values = bias
            .flatten_all()
            .and_then(|b| b.to_dtype(candle_core::DType::F32))
            .and_then(|b| b.to_vec1::<f32>())
            .map_err(|e| Error::load(category, format!("invalid bias tensor: {}", e)))?;

        match values.as_slice() {
            [bias] => Ok(*bias),
            other => Err(Error::load(
                category,
                format!("bias tensor must hold one value, found {}", other.len()),
            )),
        }
    }
}

impl ModelLoader for SafeTensorsLoader {
    fn load(&self, spec: &ModelSpec, feature_dim: usize) -> Result<Box<dyn RiskModel>> {
        let category = spec.category.as_str();
        let path = Self::resolve_model_path(spec)?;
        let device = self.create_device(category)?;

        debug!(category, path = ?path, "reading model weights");

        let mut tensors = candle_core::safetensors::load(&path, &device)
            .map_err(|e| Error::load(category, format!("failed to read safetensors: {}", e)))?;

        let weight = tensors
            .remove(WEIGHT_TENSOR)
            .ok_or_else(|| Error::load(category, format!("missing '{}' tensor", WEIGHT_TENSOR)))?;

        if weight.elem_count() != feature_dim {
            return Err(Error::load(
                category,
                format!(
                    "weight has {} elements, expected {}",
                    weight.elem_count(),
                    feature_dim
                ),
            ));
        }

        let bias = Self::read_bias(&mut tensors, category)?;
        let model = LinearRiskModel::from_tensor(spec.category.clone(), weight, bias, device)?;

        Ok(Box::new(model))
    }
}
