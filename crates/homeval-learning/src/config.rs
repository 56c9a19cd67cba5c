//! Configuration types for model training.
//!
//! This module provides [`TrainingConfig`] and its builder, and the
//! [`ParamGrid`] searched when grid search is enabled.
//!
//! # Example
//!
//! ```
//! use homeval_learning::{ParamGrid, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .test_size(0.2)
//!     .cv_folds(5)
//!     .grid_search(true)
//!     .param_grid(ParamGrid::default().n_estimators(vec![100, 200]))
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.random_seed, 2137);
//! ```

use crate::error::LearningError;
use crate::forest::{ForestParams, MaxFeatures};
use homeval_processing::config::{DEFAULT_ID_COLUMN, DEFAULT_TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed of the train/validation split and of every forest.
pub const DEFAULT_RANDOM_SEED: u64 = 2137;

/// Share of rows held out for validation.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Folds of the grid-search cross-validation.
pub const DEFAULT_CV_FOLDS: usize = 5;

/// Number of ranked features recorded in the model metadata.
pub const DEFAULT_TOP_FEATURES: usize = 10;

/// Hyperparameter values tried by grid search.
///
/// Every combination of the listed values is one candidate; the values not
/// covered by the grid (such as `bootstrap`) come from the base
/// [`ForestParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![None, Some(20)],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
            max_features: vec![MaxFeatures::All, MaxFeatures::Sqrt],
        }
    }
}

impl ParamGrid {
    /// A grid holding only the values of `params`.
    pub fn single(params: &ForestParams) -> Self {
        Self {
            n_estimators: vec![params.n_estimators],
            max_depth: vec![params.max_depth],
            min_samples_split: vec![params.min_samples_split],
            min_samples_leaf: vec![params.min_samples_leaf],
            max_features: vec![params.max_features],
        }
    }

    #[must_use]
    pub fn n_estimators(mut self, values: Vec<usize>) -> Self {
        self.n_estimators = values;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, values: Vec<Option<usize>>) -> Self {
        self.max_depth = values;
        self
    }

    #[must_use]
    pub fn min_samples_split(mut self, values: Vec<usize>) -> Self {
        self.min_samples_split = values;
        self
    }

    #[must_use]
    pub fn min_samples_leaf(mut self, values: Vec<usize>) -> Self {
        self.min_samples_leaf = values;
        self
    }

    #[must_use]
    pub fn max_features(mut self, values: Vec<MaxFeatures>) -> Self {
        self.max_features = values;
        self
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.max_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All candidates, varying the last axis fastest.
    pub fn candidates(&self, base: &ForestParams) -> Vec<ForestParams> {
        let mut candidates = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        for &max_features in &self.max_features {
                            candidates.push(ForestParams {
                                n_estimators,
                                max_depth,
                                min_samples_split,
                                min_samples_leaf,
                                max_features,
                                ..base.clone()
                            });
                        }
                    }
                }
            }
        }
        candidates
    }
}

/// Configuration of the [`Trainer`](crate::Trainer).
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the
/// builder pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Name of the target column.
    /// Default: "SalePrice"
    pub target_column: String,

    /// Name of the row identifier column, used to label validation rows.
    /// Default: "Id"
    pub id_column: String,

    /// Fraction of rows held out for validation, in `(0, 1)`.
    /// Default: 0.2
    pub test_size: f64,

    /// Seed of the split, the folds and the forests.
    /// Default: 2137
    pub random_seed: u64,

    /// Number of cross-validation folds for grid search (at least 2).
    /// Default: 5
    pub cv_folds: usize,

    /// Whether to search [`param_grid`](Self::param_grid) before the final fit.
    /// Default: false
    pub grid_search: bool,

    /// Values tried by grid search.
    pub param_grid: ParamGrid,

    /// Forest parameters used without grid search, and the base of every
    /// grid candidate.
    pub forest: ForestParams,

    /// Number of ranked features written to the model metadata.
    /// Default: 10
    pub top_features: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            test_size: DEFAULT_TEST_SIZE,
            random_seed: DEFAULT_RANDOM_SEED,
            cv_folds: DEFAULT_CV_FOLDS,
            grid_search: false,
            param_grid: ParamGrid::default(),
            forest: ForestParams::default(),
            top_features: DEFAULT_TOP_FEATURES,
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), TrainingConfigError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainingConfigError::TestSize(self.test_size));
        }
        if self.cv_folds < 2 {
            return Err(TrainingConfigError::CvFolds(self.cv_folds));
        }
        if self.top_features == 0 {
            return Err(TrainingConfigError::TopFeatures);
        }
        if self.target_column.trim().is_empty() {
            return Err(TrainingConfigError::EmptyTarget);
        }
        self.forest
            .validate()
            .map_err(TrainingConfigError::Forest)?;

        if self.grid_search {
            if self.param_grid.is_empty() {
                return Err(TrainingConfigError::EmptyGrid);
            }
            for candidate in self.param_grid.candidates(&self.forest) {
                candidate.validate().map_err(TrainingConfigError::Forest)?;
            }
        }
        Ok(())
    }
}

/// Errors that can occur during training configuration validation.
#[derive(Debug, Error)]
pub enum TrainingConfigError {
    #[error("test_size must be between 0.0 and 1.0 (exclusive), got {0}")]
    TestSize(f64),

    #[error("cv_folds must be at least 2, got {0}")]
    CvFolds(usize),

    #[error("top_features must be at least 1")]
    TopFeatures,

    #[error("target_column must not be empty")]
    EmptyTarget,

    #[error("param_grid has no candidates")]
    EmptyGrid,

    #[error("invalid forest parameters: {0}")]
    Forest(String),
}

impl From<TrainingConfigError> for LearningError {
    fn from(err: TrainingConfigError) -> Self {
        LearningError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to
/// allow method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the target column name.
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = column.into();
        self
    }

    /// Set the row identifier column name.
    #[must_use]
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.config.id_column = column.into();
        self
    }

    /// Set the validation fraction (default: 0.2).
    ///
    /// [`build()`](Self::build) returns an error unless `0.0 < size < 1.0`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed for reproducibility (default: 2137).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    ///
    /// [`build()`](Self::build) returns an error if `folds < 2`.
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Enable or disable grid search (default: false).
    #[must_use]
    pub fn grid_search(mut self, enabled: bool) -> Self {
        self.config.grid_search = enabled;
        self
    }

    /// Set the grid searched when grid search is enabled.
    #[must_use]
    pub fn param_grid(mut self, grid: ParamGrid) -> Self {
        self.config.param_grid = grid;
        self
    }

    /// Set the forest parameters.
    #[must_use]
    pub fn forest(mut self, params: ForestParams) -> Self {
        self.config.forest = params;
        self
    }

    /// Set the number of trees of the forest.
    #[must_use]
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.forest.n_estimators = n;
        self
    }

    /// Set how many ranked features the metadata keeps (default: 10).
    #[must_use]
    pub fn top_features(mut self, n: usize) -> Self {
        self.config.top_features = n;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] describing the first invalid
    /// setting.
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
