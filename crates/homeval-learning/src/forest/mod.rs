//! Random-forest regression.
//!
//! Bootstrap-aggregated CART trees grown on the mean-squared-error criterion.
//! Every tree owns a seed derived from the forest seed, so a forest fitted
//! twice on the same rows with the same parameters is identical regardless of
//! how rayon schedules the trees.

mod random_forest;
mod tree;

pub use random_forest::RandomForestRegressor;
pub use tree::RegressionTree;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature, as in a bagged ensemble.
    #[default]
    All,
    /// `floor(sqrt(n))` features.
    Sqrt,
    /// `floor(log2(n))` features.
    Log2,
    /// A fraction of the features in `(0, 1]`.
    Fraction(f64),
    /// A fixed count, capped at the number of features.
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a feature count for a matrix of `n_features` columns.
    /// Never less than 1 nor more than `n_features`.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let count = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(fraction) => (fraction * n).floor() as usize,
            MaxFeatures::Count(count) => count,
        };
        count.clamp(1, n_features.max(1))
    }

    pub(crate) fn is_valid(&self) -> bool {
        match *self {
            MaxFeatures::Fraction(fraction) => fraction > 0.0 && fraction <= 1.0,
            MaxFeatures::Count(count) => count > 0,
            _ => true,
        }
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::All => write!(f, "all"),
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
            MaxFeatures::Fraction(fraction) => write!(f, "{fraction}"),
            MaxFeatures::Count(count) => write!(f, "{count}"),
        }
    }
}

/// Hyperparameters of a [`RandomForestRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees in the forest.
    /// Default: 100
    pub n_estimators: usize,

    /// Maximum tree depth, `None` grows until leaves are pure or too small.
    /// Default: None
    pub max_depth: Option<usize>,

    /// Minimum samples a node needs to be split.
    /// Default: 2
    pub min_samples_split: usize,

    /// Minimum samples each child of a split must keep.
    /// Default: 1
    pub min_samples_leaf: usize,

    /// Features considered per split.
    /// Default: all
    pub max_features: MaxFeatures,

    /// Whether each tree is grown on a bootstrap sample.
    /// Default: true
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    /// Describe the first invalid parameter, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }
        if self.max_depth == Some(0) {
            return Err("max_depth must be at least 1".to_string());
        }
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be at least 2".to_string());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_string());
        }
        if !self.max_features.is_valid() {
            return Err(format!("max_features '{}' is out of range", self.max_features));
        }
        Ok(())
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}, max_features={}",
            self.n_estimators, depth, self.min_samples_split, self.min_samples_leaf, self.max_features
        )
    }
}
