//! Configuration types for the preparation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default target column of the Ames dataset.
pub const DEFAULT_TARGET_COLUMN: &str = "SalePrice";

/// Default row identifier column.
pub const DEFAULT_ID_COLUMN: &str = "Id";

/// Default multiplier for the interquartile-range outlier rule.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 2.0;

/// Configuration for the preparation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use homeval_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .remove_outliers(true)
///     .iqr_multiplier(1.5)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the target column.
    /// Default: "SalePrice"
    pub target_column: String,

    /// Name of the row identifier column. It is carried through cleaning but
    /// never becomes a model feature.
    /// Default: "Id"
    pub id_column: String,

    /// Whether to drop rows whose target lies outside the IQR fence.
    /// Default: true
    pub remove_outliers: bool,

    /// Multiplier `k` of the fence `[Q1 - k*IQR, Q3 + k*IQR]`.
    /// Default: 2.0
    pub iqr_multiplier: f64,

    /// Directory the processed dataset is written to.
    /// Default: "datasets/processed"
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            remove_outliers: true,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            output_dir: PathBuf::from("datasets/processed"),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName(
                "target_column".to_string(),
            ));
        }

        if self.id_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyColumnName(
                "id_column".to_string(),
            ));
        }

        if self.target_column == self.id_column {
            return Err(ConfigValidationError::SameColumn(self.target_column.clone()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid IQR multiplier: {0} (must be a finite value >= 0)")]
    InvalidMultiplier(f64),

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),

    #[error("Target and id column must differ (both are '{0}')")]
    SameColumn(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    target_column: Option<String>,
    id_column: Option<String>,
    remove_outliers: Option<bool>,
    iqr_multiplier: Option<f64>,
    output_dir: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    /// Set the target column name.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Set the row identifier column name.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Enable or disable target outlier removal.
    pub fn remove_outliers(mut self, remove: bool) -> Self {
        self.remove_outliers = Some(remove);
        self
    }

    /// Set the IQR multiplier `k`.
    pub fn iqr_multiplier(mut self, k: f64) -> Self {
        self.iqr_multiplier = Some(k);
        self
    }

    /// Set the output directory for the processed dataset.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            target_column: self.target_column.unwrap_or(defaults.target_column),
            id_column: self.id_column.unwrap_or(defaults.id_column),
            remove_outliers: self.remove_outliers.unwrap_or(defaults.remove_outliers),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
        };

        config.validate()?;
        Ok(config)
    }
}
