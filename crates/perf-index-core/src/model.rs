use thiserror::Error;

use crate::features::{FeatureVector, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelShapeError {
    #[error("expected 5 weights, found {0}")]
    WeightCount(usize),
    #[error("weight {index} is not a finite number")]
    NonFiniteWeight { index: usize },
    #[error("intercept is not a finite number")]
    NonFiniteIntercept,
}

/// Fitted linear regressor: one weight per feature plus an intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: [f64; FEATURE_COUNT],
    intercept: f64,
}

impl LinearModel {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Result<Self, ModelShapeError> {
        let count = weights.len();
        let weights: [f64; FEATURE_COUNT] = weights
            .try_into()
            .map_err(|_| ModelShapeError::WeightCount(count))?;
        if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
            return Err(ModelShapeError::NonFiniteWeight { index });
        }
        if !intercept.is_finite() {
            return Err(ModelShapeError::NonFiniteIntercept);
        }
        Ok(Self { weights, intercept })
    }

    pub fn weights(&self) -> &[f64; FEATURE_COUNT] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .zip(features.values())
            .fold(self.intercept, |acc, (w, x)| acc + w * x)
    }
}
