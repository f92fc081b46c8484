use thiserror::Error;

use crate::features::FeatureVector;
use crate::interpret::{clip_score, tips, Tier, Tip};
use crate::model::LinearModel;

/// The single failure mode of the prediction path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model unavailable: {reason}")]
pub struct ModelUnavailable {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Ready(LinearModel),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub raw_score: f64,
    pub score: u8,
    pub tier: Tier,
    pub tips: Vec<Tip>,
}

impl PredictionResult {
    pub fn is_balanced(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn tip_messages(&self) -> Vec<&'static str> {
        self.tips.iter().map(|tip| tip.message()).collect()
    }
}

/// Read-only scoring state, built once and shared for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorer {
    state: ModelState,
}

impl Scorer {
    pub fn new(model: LinearModel) -> Self {
        Self {
            state: ModelState::Ready(model),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn model(&self) -> Result<&LinearModel, ModelUnavailable> {
        match &self.state {
            ModelState::Ready(model) => Ok(model),
            ModelState::Unavailable { reason } => Err(ModelUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ModelUnavailable> {
        Ok(self.model()?.predict(features))
    }

    pub fn tips(&self, features: &FeatureVector) -> Vec<Tip> {
        tips(features)
    }

    pub fn evaluate(&self, features: &FeatureVector) -> Result<PredictionResult, ModelUnavailable> {
        let raw_score = self.predict(features)?;
        let score = clip_score(raw_score);
        Ok(PredictionResult {
            raw_score,
            score,
            tier: Tier::from_score(score),
            tips: tips(features),
        })
    }
}

impl From<LinearModel> for Scorer {
    fn from(model: LinearModel) -> Self {
        Self::new(model)
    }
}
