//! Price prediction with a loaded model.
//!
//! A [`PredictionContext`] is loaded once per model directory and passed to
//! every [`Predictor`]; nothing is cached globally. After retraining, call
//! [`PredictionContext::reload`] to pick up the new artifact.
//!
//! # Example
//!
//! ```rust,ignore
//! use homeval_learning::{PredictionContext, Predictor};
//! use homeval_processing::RawRecord;
//!
//! let context = PredictionContext::load("model".as_ref())?;
//! let estimate = Predictor::new(&context).predict_record(
//!     &RawRecord::new()
//!         .with("OverallQual", 7)
//!         .with("GrLivArea", 1710.0)
//!         .with("Neighborhood", "CollgCr"),
//! )?;
//! println!("${:.0} (${:.0} - ${:.0})", estimate.price, estimate.confidence_low, estimate.confidence_high);
//! ```

use crate::error::{LearningError, Result};
use crate::model::ModelArtifact;
use homeval_processing::utils::{has_column, numeric_values};
use homeval_processing::{PreparationPipeline, RawRecord, SchemaAligner};
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column used for the price per square foot.
pub const LIVING_AREA_COLUMN: &str = "GrLivArea";

/// A loaded model with its schema and reference tables.
#[derive(Debug, Clone)]
pub struct PredictionContext {
    artifact: ModelArtifact,
    source: Option<PathBuf>,
}

impl PredictionContext {
    /// Load the artifact stored in `dir`.
    ///
    /// # Errors
    ///
    /// [`LearningError::ModelNotFound`] if any artifact file is missing.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            artifact: ModelArtifact::load(dir)?,
            source: Some(dir.to_path_buf()),
        })
    }

    /// Wrap an artifact that is already in memory, such as a fresh training
    /// result.
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            artifact,
            source: None,
        }
    }

    /// Re-read the artifact from the directory this context was loaded from.
    /// On failure the current artifact stays in place.
    pub fn reload(&mut self) -> Result<()> {
        let dir = self.source.as_deref().ok_or_else(|| {
            LearningError::InvalidConfig("context was not loaded from a directory".to_string())
        })?;
        self.artifact = ModelArtifact::load(dir)?;
        info!("Reloaded model from {}", dir.display());
        Ok(())
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Directory the artifact was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// A single price estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePrediction {
    pub price: f64,
    /// `price / GrLivArea`, or 0 when the living area is unknown.
    pub price_per_sqft: f64,
    /// `max(0, price - rmse)` with the validation RMSE.
    pub confidence_low: f64,
    /// `price + rmse`.
    pub confidence_high: f64,
}

/// A successful row of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowPrediction {
    /// Zero-based row position in the input.
    pub row: usize,
    pub id: Option<i64>,
    pub price: f64,
}

/// A row that could not be predicted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub id: Option<i64>,
    pub message: String,
}

/// Result of [`Predictor::predict_frame`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPrediction {
    pub predictions: Vec<RowPrediction>,
    pub failures: Vec<RowFailure>,
    /// Whether the input carried the id column.
    pub has_ids: bool,
}

impl BatchPrediction {
    /// Every input row as an output frame, in input order: `Id` (when the
    /// input had an id column) followed by the target column. Failed rows
    /// have a null price.
    pub fn to_dataframe(&self, id_column: &str, target_column: &str) -> Result<DataFrame> {
        let mut rows: Vec<(usize, Option<i64>, Option<f64>)> = self
            .predictions
            .iter()
            .map(|p| (p.row, p.id, Some(p.price)))
            .chain(self.failures.iter().map(|f| (f.row, f.id, None)))
            .collect();
        rows.sort_by_key(|(row, _, _)| *row);

        let mut columns: Vec<Column> = Vec::with_capacity(2);
        if self.has_ids {
            let ids: Vec<Option<i64>> = rows.iter().map(|(_, id, _)| *id).collect();
            columns.push(Series::new(id_column.into(), ids).into());
        }
        let prices: Vec<Option<f64>> = rows.iter().map(|(_, _, price)| *price).collect();
        columns.push(Series::new(target_column.into(), prices).into());

        Ok(DataFrame::new(columns)?)
    }
}

/// Runs the frozen preparation steps and the forest on new rows.
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'a> {
    context: &'a PredictionContext,
}

impl<'a> Predictor<'a> {
    pub fn new(context: &'a PredictionContext) -> Self {
        Self { context }
    }

    /// Estimate the price of one listing. Fields missing from the record take
    /// the training defaults.
    pub fn predict_record(&self, record: &RawRecord) -> Result<PricePrediction> {
        let df = record.to_dataframe()?;
        let (price, aligned) = self.predict_one(&df)?;

        let living_area = record
            .number(LIVING_AREA_COLUMN)
            .or_else(|| single_value(&aligned, LIVING_AREA_COLUMN));
        let price_per_sqft = match living_area {
            Some(area) if area > 0.0 => price / area,
            _ => 0.0,
        };

        let rmse = self.context.artifact().validation_rmse();
        Ok(PricePrediction {
            price,
            price_per_sqft,
            confidence_low: (price - rmse).max(0.0),
            confidence_high: price + rmse,
        })
    }

    /// Predict every row of `df`. Each row is prepared on its own; a row that
    /// fails is recorded in [`BatchPrediction::failures`] and the rest of the
    /// batch continues. Errors that are not specific to one row, such as a
    /// schema alignment mismatch, fail the batch.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<BatchPrediction> {
        let id_column = &self.context.artifact().reference().id_column;
        let has_ids = has_column(df, id_column);
        let ids: Vec<Option<i64>> = if has_ids {
            numeric_values(df, id_column)?
                .unwrap_or_default()
                .into_iter()
                .map(|id| id.map(|v| v as i64))
                .collect()
        } else {
            vec![None; df.height()]
        };

        let mut batch = BatchPrediction {
            has_ids,
            ..BatchPrediction::default()
        };
        for (row, id) in ids.into_iter().enumerate() {
            match self.predict_one(&df.slice(row as i64, 1)) {
                Ok((price, _)) => batch.predictions.push(RowPrediction { row, id, price }),
                Err(err) if err.is_row_level() => {
                    warn!("Row {row} failed: {err}");
                    batch.failures.push(RowFailure {
                        row,
                        id,
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Predicted {} rows, {} failed",
            batch.predictions.len(),
            batch.failures.len()
        );
        Ok(batch)
    }

    fn predict_one(&self, df: &DataFrame) -> Result<(f64, DataFrame)> {
        let artifact = self.context.artifact();
        let aligned =
            PreparationPipeline::transform_with(df, artifact.reference(), artifact.schema())?;
        let rows = SchemaAligner::to_rows(&aligned, artifact.schema())?;
        let row = rows
            .first()
            .ok_or_else(|| LearningError::InferenceError("no row to predict".to_string()))?;

        let price = artifact.forest().predict_row(row)?;
        debug!("Predicted {price:.2}");
        Ok((price, aligned))
    }
}

fn single_value(df: &DataFrame, column: &str) -> Option<f64> {
    numeric_values(df, column).ok().flatten()?.first().copied().flatten()
}
