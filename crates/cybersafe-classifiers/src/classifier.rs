//! Risk model trait and the classifier port

use crate::encoder::FeatureVector;
use crate::model_loader::{ModelLoader, ModelSpec};
use cybersafe_core::{CategoryScore, Error, PipelineConfig, Result, RiskCategory};
use std::collections::HashMap;
use tracing::{info, warn};

/// A loaded scoring model for one risk category.
///
/// Only `Send`: the numeric runtime behind a model is not assumed to be
/// thread-safe, so a model is owned and driven by one thread at a time.
pub trait RiskModel: Send {
    /// Category this model scores
    fn category(&self) -> &RiskCategory;

    /// Expected feature vector length
    fn input_dim(&self) -> usize;

    /// Probability in [0, 1] that the features belong to the category
    fn score(&self, features: &FeatureVector) -> Result<f32>;
}

/// Lifecycle of the classifier port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Nothing loaded yet
    Unloaded,
    /// Every configured model loaded
    Ready,
    /// At least one model failed to load; nothing is scored
    Failed,
    /// Models freed at shutdown
    Released,
}

/// All registered risk models behind one `score` capability.
///
/// Fails closed: unless every configured category loaded, the port scores
/// nothing. Not internally synchronized; callers serialize access.
pub struct ClassifierPort {
    models: Vec<Box<dyn RiskModel>>,
    feature_dim: usize,
    state: PortState,
}

impl ClassifierPort {
    /// Create an empty, unready port
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            feature_dim: 0,
            state: PortState::Unloaded,
        }
    }

    /// Load one model per configured category, exactly once.
    ///
    /// Every spec is attempted so that all failures are logged. If any
    /// category is missing or fails, no model is kept and the port is
    /// marked [`PortState::Failed`].
    pub fn load_all(
        &mut self,
        loader: &dyn ModelLoader,
        specs: &[ModelSpec],
        config: &PipelineConfig,
    ) -> Result<()> {
        if self.state != PortState::Unloaded {
            return Err(Error::internal(format!(
                "classifier port cannot load from state {:?}",
                self.state
            )));
        }

        info!("Loading {} risk models", config.categories.len());

        let mut by_category: HashMap<&RiskCategory, &ModelSpec> = HashMap::new();
        for spec in specs {
            if !config.categories.contains(&spec.category) {
                warn!(category = %spec.category, "ignoring model for unregistered category");
                continue;
            }
            if by_category.insert(&spec.category, spec).is_some() {
                self.state = PortState::Failed;
                return Err(Error::load(
                    spec.category.as_str(),
                    "more than one model source configured",
                ));
            }
        }

        let mut loaded = Vec::with_capacity(config.categories.len());
        let mut failures = Vec::new();

        for category in &config.categories {
            let result = match by_category.get(category) {
                Some(spec) => loader.load(spec, config.feature_dim).and_then(|model| {
                    if model.category() != category {
                        Err(Error::load(
                            category.as_str(),
                            format!("loader returned a '{}' model", model.category()),
                        ))
                    } else if model.input_dim() != config.feature_dim {
                        Err(Error::load(
                            category.as_str(),
                            format!(
                                "model expects {} features, encoder produces {}",
                                model.input_dim(),
                                config.feature_dim
                            ),
                        ))
                    } else {
                        Ok(model)
                    }
                }),
                None => Err(Error::load(category.as_str(), "no model source configured")),
            };

            match result {
                Ok(model) => {
                    info!(category = %category, "✓ Loaded risk model");
                    loaded.push(model);
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "✗ Failed to load risk model");
                    failures.push(e);
                }
            }
        }

        if let Some(first) = failures.into_iter().next() {
            // Partial sets are never kept.
            drop(loaded);
            self.state = PortState::Failed;
            return Err(first);
        }

        self.models = loaded;
        self.feature_dim = config.feature_dim;
        self.state = PortState::Ready;

        info!("Classifier port ready with {} models", self.models.len());
        Ok(())
    }

    /// Score a feature vector with every model, in registration order
    pub fn score(&self, features: &FeatureVector) -> Result<Vec<CategoryScore>> {
        if self.state != PortState::Ready {
            return Err(Error::NotReady);
        }

        if features.len() != self.feature_dim {
            return Err(Error::internal(format!(
                "expected {} features, got {}",
                self.feature_dim,
                features.len()
            )));
        }

        self.models
            .iter()
            .map(|model| {
                model
                    .score(features)
                    .map(|score| CategoryScore::new(model.category().clone(), score))
            })
            .collect()
    }

    /// Free every model. Idempotent.
    pub fn release(&mut self) {
        if self.state == PortState::Released {
            return;
        }

        let count = self.models.len();
        self.models.clear();
        self.state = PortState::Released;

        info!("Released {} risk models", count);
    }

    pub fn is_ready(&self) -> bool {
        self.state == PortState::Ready
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    /// Loaded categories, in registration order
    pub fn categories(&self) -> Vec<RiskCategory> {
        self.models.iter().map(|m| m.category().clone()).collect()
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ClassifierPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClassifierPort {
    fn drop(&mut self) {
        if self.state == PortState::Ready {
            self.release();
        }
    }
}
