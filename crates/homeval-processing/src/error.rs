//! Custom error types for the house-price preparation pipeline.
//!
//! This module provides the error hierarchy used by the cleaner, feature
//! engineer, encoder and schema aligner, built on `thiserror`.
//!
//! Errors are serializable so that callers (CLI, services) can surface them
//! as a `{ code, message }` pair.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the preparation pipeline.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A column the operation cannot work without is absent from the table.
    #[error("Schema error: required column '{0}' is missing")]
    Schema(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A derived feature could not be computed because a source column
    /// without a documented default is missing.
    #[error("Cannot compute feature '{feature}': source column '{column}' is missing")]
    FeatureComputation { feature: String, column: String },

    /// The aligned table does not match the frozen feature schema.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a [`ProcessingError::FeatureComputation`].
    pub fn feature(feature: impl Into<String>, column: impl Into<String>) -> Self {
        ProcessingError::FeatureComputation {
            feature: feature.into(),
            column: column.into(),
        }
    }

    /// Get a stable error code for callers that branch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::FeatureComputation { .. } => "FEATURE_COMPUTATION_ERROR",
            Self::Alignment(_) => "ALIGNMENT_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error concerns a single input row rather than the
    /// pipeline as a whole. Batch prediction keeps going on these.
    pub fn is_row_level(&self) -> bool {
        match self {
            Self::FeatureComputation { .. }
            | Self::Schema(_)
            | Self::NoValidValues(_)
            | Self::Polars(_) => true,
            Self::WithContext { source, .. } => source.is_row_level(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for preparation operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ProcessingError::Schema("SalePrice".to_string()).error_code(),
            "SCHEMA_ERROR"
        );
        assert_eq!(
            ProcessingError::feature("HouseAge", "YearBuilt").error_code(),
            "FEATURE_COMPUTATION_ERROR"
        );
    }

    #[test]
    fn test_feature_error_message_names_both_columns() {
        let error = ProcessingError::feature("HouseAge", "YearBuilt");
        let message = error.to_string();
        assert!(message.contains("HouseAge"));
        assert!(message.contains("YearBuilt"));
    }

    #[test]
    fn test_is_row_level() {
        assert!(ProcessingError::feature("HouseAge", "YrSold").is_row_level());
        assert!(!ProcessingError::Alignment("width".to_string()).is_row_level());
        assert!(
            ProcessingError::Polars(polars::error::PolarsError::ComputeError(
                "cannot cast".into()
            ))
            .is_row_level()
        );
        assert!(
            ProcessingError::feature("HouseAge", "YrSold")
                .with_context("row 3")
                .is_row_level()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = ProcessingError::ColumnNotFound("LotArea".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("LotArea"));
    }

    #[test]
    fn test_with_context() {
        let error =
            ProcessingError::Alignment("width 3 != 4".to_string()).with_context("During predict");
        assert!(error.to_string().contains("During predict"));
        assert_eq!(error.error_code(), "ALIGNMENT_ERROR");
    }
}
