//! Linear risk model backed by Candle tensors

use crate::classifier::RiskModel;
use crate::encoder::FeatureVector;
use candle_core::{DType, Device, Tensor};
use cybersafe_core::{Error, Result, RiskCategory};

/// Logistic scorer: `sigmoid(weight · x + bias)`
pub struct LinearRiskModel {
    category: RiskCategory,
    weight: Tensor,
    bias: f32,
    device: Device,
}

impl LinearRiskModel {
    /// Build a model from a weight tensor of any shape holding `dim` elements
    pub fn from_tensor(
        category: RiskCategory,
        weight: Tensor,
        bias: f32,
        device: Device,
    ) -> Result<Self> {
        let weight = weight
            .flatten_all()
            .and_then(|w| w.to_dtype(DType::F32))
            .and_then(|w| w.to_device(&device))
            .map_err(|e| Error::load(category.as_str(), format!("invalid weight tensor: {}", e)))?;

        Ok(Self {
            category,
            weight,
            bias,
            device,
        })
    }

    /// Build a CPU model from raw weights
    pub fn from_weights(category: RiskCategory, weights: Vec<f32>, bias: f32) -> Result<Self> {
        let device = Device::Cpu;
        let len = weights.len();
        let weight = Tensor::from_vec(weights, len, &device)
            .map_err(|e| Error::load(category.as_str(), format!("invalid weights: {}", e)))?;
        Self::from_tensor(category, weight, bias, device)
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    fn logit(&self, features: &FeatureVector) -> candle_core::Result<f32> {
        let x = Tensor::from_slice(features.as_slice(), features.len(), &self.device)?;
        let dot = self.weight.mul(&x)?.sum_all()?.to_scalar::<f32>()?;
        Ok(dot + self.bias)
    }
}

impl RiskModel for LinearRiskModel {
    fn category(&self) -> &RiskCategory {
        &self.category
    }

    fn input_dim(&self) -> usize {
        self.weight.elem_count()
    }

    fn score(&self, features: &FeatureVector) -> Result<f32> {
        if features.len() != self.input_dim() {
            return Err(Error::internal(format!(
                "{} model expects {} features, got {}",
                self.category,
                self.input_dim(),
                features.len()
            )));
        }

        let logit = self
            .logit(features)
            .map_err(|e| Error::internal(format!("{} model inference failed: {}", self.category, e)))?;

        Ok(sigmoid(logit))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_weights_score_half() {
        let model = LinearRiskModel::from_weights(RiskCategory::insult(), vec![0.0; 4], 0.0).unwrap();
        let score = model.score(&FeatureVector::from_values(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_and_bias() {
        let model =
            LinearRiskModel::from_weights(RiskCategory::threat(), vec![1.0, -1.0, 0.5], -0.5).unwrap();
        // 1*2 - 1*1 + 0.5*1 - 0.5 = 1.0
        let score = model.score(&FeatureVector::from_values(vec![2.0, 1.0, 1.0])).unwrap();
        assert!((score - sigmoid(1.0)).abs() < 1e-6);
        assert_eq!(model.input_dim(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = LinearRiskModel::from_weights(RiskCategory::bullying(), vec![0.1; 8], 0.0).unwrap();
        assert!(model.score(&FeatureVector::zeros(4)).is_err());
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let model = LinearRiskModel::from_weights(RiskCategory::insult(), vec![100.0; 2], 0.0).unwrap();
        let high = model.score(&FeatureVector::from_values(vec![1.0, 1.0])).unwrap();
        let low = model.score(&FeatureVector::from_values(vec![-1.0, -1.0])).unwrap();
        assert!((0.0..=1.0).contains(&high));
        assert!((0.0..=1.0).contains(&low));
        assert!(high > 0.99 && low < 0.01);
    }
}
