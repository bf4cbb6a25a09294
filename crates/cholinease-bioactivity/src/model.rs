//! Pre-trained pIC50 regression model.
//!
//! The model artifact is JSON exported from the training environment. Two
//! estimator shapes are understood:
//!
//! | `kind`          | prediction                                        |
//! |-----------------|---------------------------------------------------|
//! | `random_forest` | mean of per-tree leaf values                      |
//! | `linear`        | `intercept + Σ coefficient·x`                     |
//!
//! Trees use the flat array layout of scikit-learn's `tree_` attribute: node
//! `i` is a leaf when `children_left[i] == -1`, otherwise a sample goes left
//! when `x[feature[i]] <= threshold[i]`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cholinease_common::config::ModelConfig;
use cholinease_common::error::{CholinEaseError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::descriptors::{FeatureList, FeatureMatrix};

const TREE_LEAF: i64 = -1;

fn default_target() -> String { "pIC50".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionModel {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub n_features: Option<usize>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub estimator: Estimator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest { trees: Vec<DecisionTree> },
    Linear { coefficients: Vec<f64>, intercept: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    fn validate(&self, n_features: Option<usize>) -> Result<()> {
        let n = self.children_left.len();
        if n == 0 {
            return Err(CholinEaseError::Model("tree has no nodes".into()));
        }
        if [self.children_right.len(), self.feature.len(), self.threshold.len(), self.value.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(CholinEaseError::Model("tree node arrays differ in length".into()));
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == TREE_LEAF {
                continue;
            }
            // children always come after their parent in the flat layout
            for child in [left, right] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(CholinEaseError::Model(format!("node {} has invalid child {}", i, child)));
                }
            }
            let feature = self.feature[i];
            if feature < 0 || n_features.is_some_and(|w| feature as usize >= w) {
                return Err(CholinEaseError::Model(format!("node {} splits on invalid feature {}", i, feature)));
            }
        }
        Ok(())
    }

    fn max_feature(&self) -> Option<usize> {
        self.children_left
            .iter()
            .zip(&self.feature)
            .filter(|(left, _)| **left != TREE_LEAF)
            .map(|(_, f)| *f as usize)
            .max()
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != TREE_LEAF {
            let feature = self.feature[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

impl RegressionModel {
    /// Load and validate a model artifact.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CholinEaseError::ModelNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        info!("Loaded {} model for {} from {:?}", model.kind(), model.target, path);
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let model: RegressionModel = serde_json::from_str(content)?;
        model.validate()?;
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self.estimator {
            Estimator::RandomForest { .. } => "random_forest",
            Estimator::Linear { .. } => "linear",
        }
    }

    /// Number of input columns the model reads.
    pub fn input_width(&self) -> usize {
        if let Some(n) = self.n_features {
            return n;
        }
        if let Some(names) = &self.feature_names {
            return names.len();
        }
        match &self.estimator {
            Estimator::Linear { coefficients, .. } => coefficients.len(),
            Estimator::RandomForest { trees } => trees
                .iter()
                .filter_map(DecisionTree::max_feature)
                .max()
                .map_or(0, |m| m + 1),
        }
    }

    /// Width the input must match exactly, when the artifact pins one down.
    /// Linear models always do; forests only when `n_features` or names are given.
    fn exact_width(&self) -> Option<usize> {
        self.n_features
            .or(self.feature_names.as_ref().map(Vec::len))
            .or(match &self.estimator {
                Estimator::Linear { coefficients, .. } => Some(coefficients.len()),
                Estimator::RandomForest { .. } => None,
            })
    }

    fn validate(&self) -> Result<()> {
        if let (Some(n), Some(names)) = (self.n_features, &self.feature_names) {
            if n != names.len() {
                return Err(CholinEaseError::Model(format!(
                    "n_features is {} but {} feature names are listed",
                    n,
                    names.len()
                )));
            }
        }
        let declared = self.n_features.or(self.feature_names.as_ref().map(Vec::len));

        match &self.estimator {
            Estimator::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(CholinEaseError::Model("random forest has no trees".into()));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(declared)
                        .map_err(|e| CholinEaseError::Model(format!("tree {}: {}", i, e)))?;
                }
            }
            Estimator::Linear { coefficients, .. } => {
                if let Some(n) = declared {
                    if n != coefficients.len() {
                        return Err(CholinEaseError::Model(format!(
                            "{} coefficients for {} features",
                            coefficients.len(),
                            n
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Check the reference feature list against what the model was trained on.
    pub fn check_features(&self, features: &FeatureList) -> Result<()> {
        if let Some(names) = &self.feature_names {
            if names.as_slice() != features.names() {
                return Err(CholinEaseError::Model(
                    "reference descriptor list does not match the model's feature names".into(),
                ));
            }
        } else {
            let too_narrow = features.len() < self.input_width();
            let mismatched = self.exact_width().is_some_and(|w| features.len() != w);
            if too_narrow || mismatched {
                return Err(CholinEaseError::Model(format!(
                    "model reads {} features but the reference list has {}",
                    self.input_width(),
                    features.len()
                )));
            }
        }
        Ok(())
    }

    pub fn predict(&self, input: &FeatureMatrix) -> Result<Vec<f64>> {
        let width = self.input_width();
        if input.width() < width || self.exact_width().is_some_and(|w| input.width() != w) {
            return Err(CholinEaseError::Model(format!(
                "X has {} features, but the model is expecting {} features as input",
                input.width(),
                width
            )));
        }

        let predictions = match &self.estimator {
            Estimator::RandomForest { trees } => input
                .rows()
                .iter()
                .map(|row| trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / trees.len() as f64)
                .collect(),
            Estimator::Linear { coefficients, intercept } => input
                .rows()
                .iter()
                .map(|row| intercept + coefficients.iter().zip(row).map(|(c, x)| c * x).sum::<f64>())
                .collect(),
        };
        debug!("Predicted {} rows", input.rows().len());
        Ok(predictions)
    }
}

/// Lazily loaded model and reference feature list, shared across requests.
pub struct ModelStore {
    config: ModelConfig,
    loaded: RwLock<Option<Arc<LoadedModel>>>,
}

pub struct LoadedModel {
    pub model: RegressionModel,
    pub features: FeatureList,
}

impl ModelStore {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            loaded: RwLock::new(None),
        }
    }

    pub fn model_path(&self) -> &PathBuf {
        &self.config.model_path
    }

    pub fn reference_path(&self) -> &PathBuf {
        &self.config.reference_csv
    }

    pub async fn is_loaded(&self) -> bool {
        self.loaded.read().await.is_some()
    }

    /// Return the cached model, loading it on first use. Failed loads are not cached.
    pub async fn get(&self) -> Result<Arc<LoadedModel>> {
        if let Some(loaded) = self.loaded.read().await.as_ref() {
            return Ok(loaded.clone());
        }

        let mut slot = self.loaded.write().await;
        if let Some(loaded) = slot.as_ref() {
            return Ok(loaded.clone());
        }

        let model_path = self.config.model_path.clone();
        let reference_path = self.config.reference_csv.clone();
        let loaded = tokio::task::spawn_blocking(move || -> Result<LoadedModel> {
            let features = FeatureList::from_reference_csv(&reference_path)?;
            let model = RegressionModel::load(&model_path)?;
            model.check_features(&features)?;
            Ok(LoadedModel { model, features })
        })
        .await
        .map_err(|e| CholinEaseError::Other(e.into()))??;

        let loaded = Arc::new(loaded);
        *slot = Some(loaded.clone());
        Ok(loaded)
    }
}
