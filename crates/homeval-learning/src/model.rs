//! Trained model artifact and its on-disk layout.
//!
//! A [`ModelArtifact`] binds a fitted [`RandomForestRegressor`] to exactly one
//! [`FeatureSchema`] and the [`ReferenceTables`] its inputs were prepared with.
//! It is immutable after creation; retraining writes a new artifact.
//!
//! # Layout
//!
//! | File | Content |
//! |------|---------|
//! | `house_price_model.bin` | bincode of the forest |
//! | `model_metadata.json` | [`ModelMetadata`] |
//! | `feature_schema.json` | ordered feature names |
//! | `reference_tables.json` | frozen preparation tables |

use crate::error::{LearningError, Result};
use crate::forest::{ForestParams, RandomForestRegressor};
use crate::metrics::RegressionMetrics;
use crate::types::FeatureImportance;
use homeval_processing::{FeatureSchema, ReferenceTables};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const MODEL_FILE: &str = "house_price_model.bin";
pub const METADATA_FILE: &str = "model_metadata.json";
pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const REFERENCE_FILE: &str = "reference_tables.json";

/// Value of [`ModelMetadata::model_type`].
pub const MODEL_TYPE: &str = "RandomForestRegressor";

/// Metrics section of the metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataMetrics {
    pub validation: RegressionMetrics,
    /// Mean cross-validated MSE of the selected candidate; absent without
    /// grid search.
    pub cv_mse: Option<f64>,
}

/// Human-readable description of a trained model, written as
/// `model_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    /// Local time of training, `%Y-%m-%d %H:%M:%S`.
    pub training_date: String,
    pub parameters: ForestParams,
    pub random_seed: u64,
    pub metrics: MetadataMetrics,
    pub top_features: Vec<FeatureImportance>,
    pub feature_count: usize,
    pub feature_set_version: u32,
    pub training_rows: usize,
    pub validation_rows: usize,
}

/// A fitted model with everything needed to prepare its inputs.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    forest: RandomForestRegressor,
    schema: FeatureSchema,
    reference: ReferenceTables,
    metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Bundle a forest with its schema, tables and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if the forest width, the schema
    /// length and the metadata feature count disagree.
    pub fn new(
        forest: RandomForestRegressor,
        schema: FeatureSchema,
        reference: ReferenceTables,
        metadata: ModelMetadata,
    ) -> Result<Self> {
        if forest.n_features() != schema.len() || metadata.feature_count != schema.len() {
            return Err(LearningError::InvalidData(format!(
                "model expects {} features, schema has {}, metadata records {}",
                forest.n_features(),
                schema.len(),
                metadata.feature_count
            )));
        }
        Ok(Self {
            forest,
            schema,
            reference,
            metadata,
        })
    }

    pub fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn reference(&self) -> &ReferenceTables {
        &self.reference
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Validation RMSE, the half-width of prediction confidence bands.
    pub fn validation_rmse(&self) -> f64 {
        self.metadata.metrics.validation.rmse
    }

    /// Write the four artifact files into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(MODEL_FILE), self.forest.to_bytes()?)?;
        fs::write(
            dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&self.metadata)?,
        )?;
        self.schema.save(&dir.join(SCHEMA_FILE))?;
        self.reference.save(&dir.join(REFERENCE_FILE))?;

        info!("Saved model artifact to {}", dir.display());
        Ok(())
    }

    /// Load an artifact written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelNotFound`] naming the first missing file.
    pub fn load(dir: &Path) -> Result<Self> {
        for file in [MODEL_FILE, METADATA_FILE, SCHEMA_FILE, REFERENCE_FILE] {
            let path = dir.join(file);
            if !path.is_file() {
                return Err(LearningError::model_not_found(&path));
            }
        }

        let forest = RandomForestRegressor::from_bytes(&fs::read(dir.join(MODEL_FILE))?)?;
        let metadata: ModelMetadata =
            serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE))?)?;
        let schema = FeatureSchema::load(&dir.join(SCHEMA_FILE))?;
        let reference = ReferenceTables::load(&dir.join(REFERENCE_FILE))?;

        info!(
            "Loaded {} with {} features from {}",
            metadata.model_type,
            schema.len(),
            dir.display()
        );
        Self::new(forest, schema, reference, metadata)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use homeval_processing::FEATURE_SET_VERSION;
    use pretty_assertions::assert_eq;

    pub(crate) fn tiny_artifact() -> ModelArtifact {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 2) as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 1000.0 * i as f64).collect();
        let params = ForestParams {
            n_estimators: 3,
            ..Default::default()
        };
        let forest = RandomForestRegressor::fit(&x, &y, &params, 1).unwrap();
        let schema = FeatureSchema::new(vec!["GrLivArea".into(), "CentralAir".into()]).unwrap();
        let metadata = ModelMetadata {
            model_type: MODEL_TYPE.to_string(),
            training_date: "2024-01-01 00:00:00".to_string(),
            parameters: params,
            random_seed: 1,
            metrics: MetadataMetrics {
                validation: RegressionMetrics {
                    rmse: 500.0,
                    mae: 400.0,
                    r2: 0.9,
                    mape: 5.0,
                },
                cv_mse: None,
            },
            top_features: Vec::new(),
            feature_count: 2,
            feature_set_version: FEATURE_SET_VERSION,
            training_rows: 16,
            validation_rows: 4,
        };
        let mut reference = ReferenceTables::default();
        for (column, value) in [("YearBuilt", 2000.0), ("YrSold", 2008.0), ("OverallQual", 6.0)] {
            reference.imputation.numeric.insert(column.to_string(), value);
        }
        ModelArtifact::new(forest, schema, reference, metadata).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = tiny_artifact();
        artifact.save(dir.path()).unwrap();

        for file in [MODEL_FILE, METADATA_FILE, SCHEMA_FILE, REFERENCE_FILE] {
            assert!(dir.path().join(file).is_file(), "{file} missing");
        }

        let loaded = ModelArtifact::load(dir.path()).unwrap();
        assert_eq!(loaded.forest(), artifact.forest());
        assert_eq!(loaded.schema(), artifact.schema());
        assert_eq!(loaded.metadata(), artifact.metadata());
        assert_eq!(loaded.validation_rmse(), 500.0);
    }

    #[test]
    fn test_metadata_json_layout() {
        let json = serde_json::to_value(tiny_artifact().metadata()).unwrap();
        assert_eq!(json["model_type"], "RandomForestRegressor");
        assert_eq!(json["metrics"]["validation"]["rmse"], 500.0);
        assert_eq!(json["parameters"]["n_estimators"], 3);
        assert!(json["top_features"].is_array());
    }

    #[test]
    fn test_missing_files_are_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, LearningError::ModelNotFound { .. }));
        assert!(err.to_string().contains(MODEL_FILE));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let artifact = tiny_artifact();
        let schema = FeatureSchema::new(vec!["GrLivArea".into()]).unwrap();
        let err = ModelArtifact::new(
            artifact.forest().clone(),
            schema,
            artifact.reference().clone(),
            artifact.metadata().clone(),
        )
        .unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
    }
}
