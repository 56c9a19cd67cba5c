//! Bootstrap-aggregated regression forest.

use super::ForestParams;
use super::tree::{RegressionTree, TreeLimits};
use crate::error::{LearningError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random-forest regressor: the mean prediction of its trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    seed: u64,
    n_features: usize,
    trees: Vec<RegressionTree>,
    /// Mean impurity decrease per feature, normalized to sum to 1.
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Fit a forest on a row-major matrix.
    ///
    /// Tree `i` draws its bootstrap sample and feature subsets from a generator
    /// seeded with `seed + i`. Trees are grown on rayon's pool.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] for an empty or ragged matrix or
    /// a target of another length, and [`LearningError::InvalidConfig`] for
    /// invalid parameters.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams, seed: u64) -> Result<Self> {
        params.validate().map_err(LearningError::InvalidConfig)?;
        if x.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(LearningError::InvalidData(format!(
                "{} feature rows but {} target values",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(LearningError::InvalidData(
                "feature rows have different widths".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(
                "target contains non-finite values".to_string(),
            ));
        }

        let limits = TreeLimits {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(n_features),
        };
        let n_rows = x.len();

        let fitted: Vec<(RegressionTree, Vec<f64>)> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let samples: Vec<usize> = if params.bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                RegressionTree::fit(x, y, samples, limits, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, tree_importances) in fitted {
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&tree_importances) {
                    *acc += value / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            "Fitted {} trees on {} rows x {} features ({})",
            trees.len(),
            n_rows,
            n_features,
            params
        );

        Ok(Self {
            params: params.clone(),
            seed,
            n_features,
            trees,
            importances,
        })
    }

    /// Predict one row of exactly [`n_features`](Self::n_features) values.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(LearningError::InferenceError(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Predict every row.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Normalized impurity-decrease importance per feature, in column order.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Encode the forest as a bincode blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a forest written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
