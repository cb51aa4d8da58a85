//! CyberSafe Classifiers
//!
//! Turns raw text into numeric risk scores without keeping anything derived
//! from the text:
//! - [`encoder`]: deterministic text → fixed-length feature vector
//! - [`classifier`]: the classifier port, a homogeneous list of risk models
//!   behind one `score` capability
//! - [`model_loader`]: loading model weights from disk or the Hugging Face Hub
//! - [`linear`]: the linear risk model the loader produces
//!
//! Models are not assumed to be thread-safe. The port must be driven by a
//! single caller at a time.

pub mod classifier;
pub mod encoder;
pub mod linear;
pub mod model_loader;

pub use classifier::{ClassifierPort, PortState, RiskModel};
pub use encoder::{FeatureEncoder, FeatureVector, HashingEncoder};
pub use linear::LinearRiskModel;
pub use model_loader::{DeviceType, ModelLoader, ModelSource, ModelSpec, SafeTensorsLoader};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassifierPort, RiskModel};
    pub use crate::encoder::{FeatureEncoder, FeatureVector, HashingEncoder};
    pub use crate::model_loader::{ModelLoader, ModelSource, ModelSpec, SafeTensorsLoader};
}
