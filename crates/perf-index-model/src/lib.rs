use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use perf_index_core::{Feature, LinearModel, ModelShapeError, Scorer, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL_FILE: &str = "linear_regression_model.json";

/// On-disk form of the fitted regressor, mirroring its `coef_`/`intercept_`
/// attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelFile {
    pub coef: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ModelFile {
    pub fn from_model(model: &LinearModel) -> Self {
        Self {
            coef: model.weights().to_vec(),
            intercept: model.intercept(),
            feature_names: Some(
                Feature::ALL
                    .iter()
                    .map(|feature| feature.column().to_string())
                    .collect(),
            ),
            target: None,
        }
    }

    pub fn into_model(self) -> Result<LinearModel, ModelLoadError> {
        if let Some(names) = &self.feature_names {
            check_feature_order(names)?;
        }
        Ok(LinearModel::new(self.coef, self.intercept)?)
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid model shape: {0}")]
    Shape(#[from] ModelShapeError),
    #[error("feature {position} should be '{expected}', found '{found}'")]
    FeatureOrder {
        position: usize,
        expected: &'static str,
        found: String,
    },
    #[error("expected 5 feature names, found {0}")]
    FeatureNameCount(usize),
}

fn check_feature_order(names: &[String]) -> Result<(), ModelLoadError> {
    if names.len() != FEATURE_COUNT {
        return Err(ModelLoadError::FeatureNameCount(names.len()));
    }
    for (position, (feature, name)) in Feature::ALL.iter().zip(names).enumerate() {
        if !feature.matches_name(name) {
            return Err(ModelLoadError::FeatureOrder {
                position,
                expected: feature.column(),
                found: name.clone(),
            });
        }
    }
    Ok(())
}

pub fn parse_model(bytes: &[u8]) -> Result<LinearModel, ModelLoadError> {
    let file: ModelFile = serde_json::from_slice(bytes)?;
    file.into_model()
}

pub fn load_model(path: impl AsRef<Path>) -> Result<LinearModel, ModelLoadError> {
    let bytes = fs::read(path.as_ref())?;
    parse_model(&bytes)
}

pub fn save_model(path: impl AsRef<Path>, model: &LinearModel) -> Result<(), ModelLoadError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = serde_json::to_vec_pretty(&ModelFile::from_model(model))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Loads the model once; any failure leaves the scorer unavailable.
pub fn load_scorer(path: impl AsRef<Path>) -> Scorer {
    let path = path.as_ref();
    match load_model(path) {
        Ok(model) => {
            tracing::info!(
                path = %path.display(),
                intercept = model.intercept(),
                "loaded performance index model"
            );
            Scorer::new(model)
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "performance index model unavailable"
            );
            Scorer::unavailable(format!("{}: {err}", path.display()))
        }
    }
}

type Loader = Box<dyn Fn() -> Scorer + Send + Sync>;

/// Defers loading to first use. Concurrent first callers block on a single
/// load; the outcome, including failure, is kept for the rest of the run.
pub struct LazyScorer {
    source: String,
    loader: Loader,
    cell: OnceLock<Scorer>,
}

impl LazyScorer {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source = path.display().to_string();
        Self::with_loader(source, move || load_scorer(&path))
    }

    pub fn with_loader(
        source: impl Into<String>,
        loader: impl Fn() -> Scorer + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            loader: Box::new(loader),
            cell: OnceLock::new(),
        }
    }

    pub fn ready(source: impl Into<String>, scorer: Scorer) -> Self {
        Self {
            source: source.into(),
            loader: Box::new(|| Scorer::unavailable("loader not configured")),
            cell: OnceLock::from(scorer),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> &Scorer {
        self.cell.get_or_init(|| (self.loader)())
    }
}

impl std::fmt::Debug for LazyScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyScorer")
            .field("source", &self.source)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
