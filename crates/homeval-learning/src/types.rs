//! Common types returned by training and prediction.

use serde::{Deserialize, Serialize};

/// One entry of the feature importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Rank features by importance, descending. Equal importances keep their
/// column order.
pub fn rank_features(names: &[String], importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances)
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

/// The held-out partition with the model's predictions for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSet {
    /// Row identifiers, taken from the id column or the row position.
    pub ids: Vec<i64>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl ValidationSet {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}
