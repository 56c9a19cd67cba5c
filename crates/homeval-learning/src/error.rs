//! Error types for the homeval-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Example
//!
//! ```no_run
//! use homeval_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are propagated with ?
//!     let config = TrainingConfig::builder().cv_folds(5).build()?;
//!     Ok(config)
//! }
//! ```

use homeval_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::Path;
use thiserror::Error;

/// The main error type for homeval-learning operations.
///
/// This enum covers all error conditions that can occur during:
/// - Training configuration and validation
/// - Model training and evaluation
/// - Model persistence
/// - Inference and prediction
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the trainer.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - Too few rows to split or to build the requested number of folds
    /// - The table contains a non-numeric column after preparation
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The specified target column was not found in the DataFrame.
    ///
    /// Column names are case-sensitive.
    #[error("Target column '{0}' not found")]
    TargetNotFound(String),

    /// Training failed.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// A model artifact file was not found.
    ///
    /// Run `homeval train` (or `homeval run-all`) to produce the model directory.
    #[error("Model not found at {path}: train the model first")]
    ModelNotFound {
        /// The path that was not found.
        path: String,
    },

    /// An error occurred during inference/prediction.
    ///
    /// Common causes:
    /// - Input features don't match the model's expected width
    /// - The model blob is corrupted
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// An error raised by the preparation pipeline.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary model (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl LearningError {
    /// Shorthand for a [`LearningError::ModelNotFound`].
    pub fn model_not_found(path: &Path) -> Self {
        LearningError::ModelNotFound {
            path: path.display().to_string(),
        }
    }

    /// Get a stable error code for callers that branch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            LearningError::InvalidConfig(_) => "INVALID_CONFIG",
            LearningError::InvalidData(_) => "INVALID_DATA",
            LearningError::TargetNotFound(_) => "TARGET_NOT_FOUND",
            LearningError::TrainingFailed(_) => "TRAINING_FAILED",
            LearningError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            LearningError::InferenceError(_) => "INFERENCE_ERROR",
            LearningError::Processing(err) => err.error_code(),
            LearningError::Polars(_) => "POLARS_ERROR",
            LearningError::Io(_) => "IO_ERROR",
            LearningError::Json(_) => "JSON_ERROR",
            LearningError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the error concerns one input row. Batch prediction records
    /// these per row and fails the whole batch on anything else.
    pub fn is_row_level(&self) -> bool {
        match self {
            LearningError::Processing(err) => err.is_row_level(),
            LearningError::Polars(_) | LearningError::InferenceError(_) => true,
            _ => false,
        }
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<homeval_processing::ConfigValidationError> for LearningError {
    fn from(err: homeval_processing::ConfigValidationError) -> Self {
        LearningError::InvalidConfig(err.to_string())
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_message() {
        let err = LearningError::model_not_found(Path::new("model/house_price_model.bin"));
        let message = err.to_string();
        assert!(message.contains("model/house_price_model.bin"));
        assert!(message.contains("train the model first"));
        assert_eq!(err.error_code(), "MODEL_NOT_FOUND");
    }

    #[test]
    fn test_processing_errors_keep_their_code() {
        let err: LearningError = ProcessingError::Alignment("width".into()).into();
        assert_eq!(err.error_code(), "ALIGNMENT_ERROR");
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn test_row_level_errors() {
        let missing: LearningError = ProcessingError::feature("HouseAge", "YrSold").into();
        let alignment: LearningError = ProcessingError::Alignment("width".into()).into();
        assert!(missing.is_row_level());
        assert!(!alignment.is_row_level());
        assert!(!LearningError::model_not_found(Path::new("model")).is_row_level());

        let cast_error = || polars::error::PolarsError::ComputeError("cannot cast".into());
        let wrapped: LearningError = ProcessingError::Polars(cast_error()).into();
        let direct = LearningError::Polars(cast_error());
        assert_eq!(wrapped.is_row_level(), direct.is_row_level());
    }

    #[test]
    fn test_serialize_as_code_and_message() {
        let err = LearningError::TargetNotFound("SalePrice".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TARGET_NOT_FOUND");
        assert_eq!(json["message"], "Target column 'SalePrice' not found");
    }
}
