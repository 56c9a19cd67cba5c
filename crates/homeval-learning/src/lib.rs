//! homeval-learning: house-price model training, evaluation and prediction.
//!
//! This crate fits a random-forest regressor on tables prepared by
//! `homeval-processing`, stores it together with the feature schema and the
//! reference tables it was trained with, and serves price estimates for new
//! listings through the same frozen preparation steps.
//!
//! # Features
//!
//! - **Random Forest**: bootstrap CART regression trees with an MSE
//!   criterion, fitted in parallel with rayon and seeded per tree
//! - **Grid Search**: optional k-fold cross-validation over a [`ParamGrid`]
//! - **Model Artifact**: bincode forest, JSON metadata, schema and reference
//!   tables in one directory
//! - **Prediction**: single records with a confidence band and batches with
//!   per-row failures
//! - **Evaluation**: text report over the validation partition
//! - **Progress Reporting**: training progress callbacks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use homeval_learning::{PredictionContext, Predictor, Trainer, TrainingConfig};
//! use homeval_processing::{PreparationPipeline, RawRecord, io};
//!
//! let prepared = PreparationPipeline::builder()
//!     .build()?
//!     .fit_transform(io::load_csv("datasets/ames-train.csv".as_ref())?)?;
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::builder().n_estimators(200).build()?)
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build()?;
//! let outcome = trainer.train(&prepared.data, &prepared.schema, &prepared.reference)?;
//! outcome.artifact.save("model".as_ref())?;
//!
//! let context = PredictionContext::load("model".as_ref())?;
//! let estimate = Predictor::new(&context)
//!     .predict_record(&RawRecord::new().with("OverallQual", 7).with("GrLivArea", 1710.0))?;
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]:
//!
//! - [`LearningError::InvalidConfig`] - Invalid training configuration
//! - [`LearningError::InvalidData`] - Too few rows, null targets, ragged input
//! - [`LearningError::ModelNotFound`] - No trained artifact in the model directory
//! - [`LearningError::Processing`] - Preparation of the input failed
//!
//! See [`LearningError`] for the complete list.
//!
//! # Modules
//!
//! - [`forest`] - Regression trees and the random forest
//! - [`metrics`] - RMSE, MAE, R² and MAPE
//! - [`evaluation`] - Validation report

mod config;
mod error;
pub mod evaluation;
pub mod forest;
pub mod metrics;
mod model;
mod predictor;
mod progress;
mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use config::{
    DEFAULT_CV_FOLDS, DEFAULT_RANDOM_SEED, DEFAULT_TEST_SIZE, DEFAULT_TOP_FEATURES, ParamGrid,
    TrainingConfig, TrainingConfigBuilder, TrainingConfigError,
};
// Error types
pub use error::{LearningError, Result};
// Evaluation
pub use evaluation::EvaluationReport;
// Forest
pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
// Metrics
pub use metrics::RegressionMetrics;
// Model artifact
pub use model::{
    METADATA_FILE, MODEL_FILE, MODEL_TYPE, MetadataMetrics, ModelArtifact, ModelMetadata,
    REFERENCE_FILE, SCHEMA_FILE,
};
// Prediction
pub use predictor::{
    BatchPrediction, LIVING_AREA_COLUMN, PredictionContext, PricePrediction, Predictor,
    RowFailure, RowPrediction,
};
// Progress reporting types
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
// Training
pub use trainer::{Trainer, TrainerBuilder, TrainingOutcome};
// Result types
pub use types::{FeatureImportance, ValidationSet, rank_features};
