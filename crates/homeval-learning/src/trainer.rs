//! Model training: validation split, optional grid search, final fit.
//!
//! # Example
//!
//! ```rust,ignore
//! use homeval_learning::{Trainer, TrainingConfig};
//!
//! let trainer = Trainer::new(TrainingConfig::default())?;
//! let outcome = trainer.train(&prepared.data, &prepared.schema, &prepared.reference)?;
//! println!("Validation RMSE: {:.2}", outcome.validation.rmse);
//! outcome.artifact.save("model".as_ref())?;
//! ```

use crate::config::TrainingConfig;
use crate::error::{LearningError, Result};
use crate::forest::{ForestParams, RandomForestRegressor};
use crate::metrics::{RegressionMetrics, mse};
use crate::model::{MODEL_TYPE, MetadataMetrics, ModelArtifact, ModelMetadata};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::types::{FeatureImportance, ValidationSet, rank_features};
use homeval_processing::utils::{has_column, numeric_values};
use homeval_processing::{FeatureSchema, ReferenceTables, SchemaAligner};
use polars::prelude::DataFrame;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The model bound to its schema and reference tables.
    pub artifact: ModelArtifact,
    /// Metrics on the held-out partition.
    pub validation: RegressionMetrics,
    /// Mean cross-validated MSE of the selected parameters, when grid search ran.
    pub cv_mse: Option<f64>,
    pub selected_params: ForestParams,
    /// Every feature ranked by importance.
    pub feature_importances: Vec<FeatureImportance>,
    /// Held-out rows with their predictions.
    pub validation_set: ValidationSet,
}

/// Row-major training matrix.
struct Matrix {
    ids: Vec<i64>,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl Matrix {
    fn rows(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        indices
            .iter()
            .map(|&i| (self.x[i].clone(), self.y[i]))
            .unzip()
    }
}

/// Fits a [`RandomForestRegressor`] on a prepared table.
///
/// Use [`Trainer::new`] or [`Trainer::builder()`] to construct one.
pub struct Trainer {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Trainer {
    /// Create a trainer after validating `config`.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train on a prepared table.
    ///
    /// `prepared` holds the schema columns and the target; other columns
    /// (such as the id) are ignored by the model. Rows are shuffled with the
    /// configured seed and the first `ceil(n * test_size)` shuffled rows form
    /// the validation partition.
    ///
    /// # Errors
    ///
    /// - [`LearningError::TargetNotFound`] if the target column is absent
    /// - [`LearningError::InvalidData`] for null targets or too few rows to
    ///   split or fold
    pub fn train(
        &self,
        prepared: &DataFrame,
        schema: &FeatureSchema,
        reference: &ReferenceTables,
    ) -> Result<TrainingOutcome> {
        let result = self.run(prepared, schema, reference);
        if let Err(err) = &result {
            self.report(ProgressUpdate::new(TrainingStage::Failed, 1.0, err.to_string()));
        }
        result
    }

    fn run(
        &self,
        prepared: &DataFrame,
        schema: &FeatureSchema,
        reference: &ReferenceTables,
    ) -> Result<TrainingOutcome> {
        let config = &self.config;
        self.report(ProgressUpdate::new(
            TrainingStage::Splitting,
            0.0,
            "Building feature matrix",
        ));

        let matrix = self.matrix(prepared, schema)?;
        let (train_idx, valid_idx) = self.split(matrix.y.len())?;
        let (train_x, train_y) = matrix.rows(&train_idx);
        let (valid_x, valid_y) = matrix.rows(&valid_idx);
        info!(
            "Split {} rows into {} training and {} validation rows (seed {})",
            matrix.y.len(),
            train_y.len(),
            valid_y.len(),
            config.random_seed
        );

        let (selected_params, cv_mse) = if config.grid_search {
            let (params, score) = self.grid_search(&train_x, &train_y)?;
            (params, Some(score))
        } else {
            (config.forest.clone(), None)
        };

        self.report(ProgressUpdate::new(
            TrainingStage::Fitting,
            0.7,
            format!("Fitting forest ({selected_params})"),
        ));
        let forest =
            RandomForestRegressor::fit(&train_x, &train_y, &selected_params, config.random_seed)?;

        self.report(ProgressUpdate::new(
            TrainingStage::Evaluation,
            0.9,
            "Scoring validation rows",
        ));
        let predicted = forest.predict(&valid_x)?;
        let validation = RegressionMetrics::compute(&valid_y, &predicted)?;
        info!(
            "Validation RMSE {:.2}, MAE {:.2}, R2 {:.4}, MAPE {:.2}%",
            validation.rmse, validation.mae, validation.r2, validation.mape
        );

        let feature_importances = rank_features(schema.columns(), forest.feature_importances());
        let metadata = ModelMetadata {
            model_type: MODEL_TYPE.to_string(),
            training_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            parameters: selected_params.clone(),
            random_seed: config.random_seed,
            metrics: MetadataMetrics { validation, cv_mse },
            top_features: feature_importances
                .iter()
                .take(config.top_features)
                .cloned()
                .collect(),
            feature_count: schema.len(),
            feature_set_version: reference.feature_set_version,
            training_rows: train_y.len(),
            validation_rows: valid_y.len(),
        };
        let artifact = ModelArtifact::new(forest, schema.clone(), reference.clone(), metadata)?;

        let validation_set = ValidationSet {
            ids: valid_idx.iter().map(|&i| matrix.ids[i]).collect(),
            actual: valid_y,
            predicted,
        };

        self.report(ProgressUpdate::new(
            TrainingStage::Complete,
            1.0,
            "Training complete",
        ));
        Ok(TrainingOutcome {
            artifact,
            validation,
            cv_mse,
            selected_params,
            feature_importances,
            validation_set,
        })
    }

    fn matrix(&self, prepared: &DataFrame, schema: &FeatureSchema) -> Result<Matrix> {
        let target = &self.config.target_column;
        let y: Vec<f64> = numeric_values(prepared, target)?
            .ok_or_else(|| LearningError::TargetNotFound(target.clone()))?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.filter(|v| v.is_finite()).ok_or_else(|| {
                    LearningError::InvalidData(format!("row {row} has no valid '{target}' value"))
                })
            })
            .collect::<Result<_>>()?;

        let aligned = SchemaAligner::align(prepared, schema)?;
        let x = SchemaAligner::to_rows(&aligned, schema)?;

        let ids = if has_column(prepared, &self.config.id_column) {
            numeric_values(prepared, &self.config.id_column)?
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(row, id)| id.map_or(row as i64, |v| v as i64))
                .collect()
        } else {
            (0..y.len() as i64).collect()
        };

        Ok(Matrix { ids, x, y })
    }

    /// Shuffled row indices split into `(training, validation)`.
    fn split(&self, n_rows: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let n_valid = (n_rows as f64 * self.config.test_size).ceil() as usize;
        if n_valid == 0 || n_rows.saturating_sub(n_valid) < 2 {
            return Err(LearningError::InvalidData(format!(
                "{n_rows} rows are too few for a {:.0}% validation split",
                self.config.test_size * 100.0
            )));
        }

        let mut indices: Vec<usize> = (0..n_rows).collect();
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        indices.shuffle(&mut rng);

        let train = indices.split_off(n_valid);
        Ok((train, indices))
    }

    /// Pick the grid candidate with the lowest mean k-fold MSE.
    ///
    /// Folds are contiguous blocks of the (already shuffled) training rows.
    /// Candidates are evaluated in parallel; ties keep the earlier candidate.
    fn grid_search(&self, x: &[Vec<f64>], y: &[f64]) -> Result<(ForestParams, f64)> {
        let config = &self.config;
        let folds = config.cv_folds;
        if y.len() < folds {
            return Err(LearningError::InvalidData(format!(
                "{} training rows cannot form {folds} folds",
                y.len()
            )));
        }

        let candidates = config.param_grid.candidates(&config.forest);
        let total = candidates.len() as u32;
        info!("Grid search over {total} candidates with {folds}-fold CV");
        self.report(
            ProgressUpdate::new(TrainingStage::GridSearch, 0.1, "Cross-validating candidates")
                .with_candidates(0, total),
        );

        let completed = AtomicU32::new(0);
        let scores: Vec<f64> = candidates
            .par_iter()
            .map(|params| {
                let score = self.cross_validate(x, y, params)?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Candidate {params}: CV MSE {score:.2}");
                self.report(
                    ProgressUpdate::new(
                        TrainingStage::GridSearch,
                        0.1 + 0.6 * f64::from(done) / f64::from(total),
                        format!("Evaluated {params}"),
                    )
                    .with_candidates(done, total),
                );
                Ok(score)
            })
            .collect::<Result<_>>()?;

        let (best, best_score) = scores
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &score)| match best {
                Some((_, best_score)) if best_score <= score => best,
                _ => Some((i, score)),
            })
            .ok_or_else(|| LearningError::TrainingFailed("no grid candidates".to_string()))?;

        info!("Selected {} (CV MSE {:.2})", candidates[best], best_score);
        Ok((candidates[best].clone(), best_score))
    }

    fn cross_validate(&self, x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<f64> {
        let n = y.len();
        let folds = self.config.cv_folds;
        let mut total = 0.0;

        for fold in 0..folds {
            let start = fold * n / folds;
            let end = (fold + 1) * n / folds;

            let mut fit_x = Vec::with_capacity(n - (end - start));
            let mut fit_y = Vec::with_capacity(n - (end - start));
            for i in (0..start).chain(end..n) {
                fit_x.push(x[i].clone());
                fit_y.push(y[i]);
            }

            let forest = RandomForestRegressor::fit(&fit_x, &fit_y, params, self.config.random_seed)?;
            let predicted = forest.predict(&x[start..end])?;
            total += mse(&y[start..end], &predicted);
        }
        Ok(total / folds as f64)
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }
}

/// Builder for [`Trainer`].
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl TrainerBuilder {
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a callback for progress updates.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Build the trainer, validating the configuration.
    pub fn build(self) -> Result<Trainer> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(Trainer {
            config,
            progress_callback: self.progress_callback,
        })
    }
}

static_assertions::assert_impl_all!(Trainer: Send, Sync);
