//! Data cleaning for the housing table.
//!
//! This module provides functionality for:
//! - Computing imputation defaults (median / mode) from a training table
//! - Filling nulls, and at inference absent columns, from those defaults
//! - Dropping rows without a target
//! - Removing target outliers with an IQR fence

mod outliers;

pub use outliers::{IqrFence, OutlierReport};

use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::imputers::StatisticalImputer;
use crate::utils::{DtypeCategory, column_names, get_dtype_category, has_column, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-column fill values computed once on the training table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationDefaults {
    /// Median of each numeric column.
    pub numeric: BTreeMap<String, f64>,
    /// Most frequent label of each string column.
    pub categorical: BTreeMap<String, String>,
}

impl ImputationDefaults {
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.categorical.is_empty()
    }
}

/// What a cleaning pass changed.
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub imputed_cells: usize,
    pub inserted_columns: Vec<String>,
    pub steps: Vec<String>,
}

/// Cleaner for the housing table.
///
/// The same frozen [`ImputationDefaults`] drive training and inference.
#[derive(Debug, Clone)]
pub struct Cleaner {
    target_column: String,
    id_column: String,
    fill_absent: bool,
}

impl Cleaner {
    /// Cleaner for training tables: only nulls of present columns are filled.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            target_column: config.target_column.clone(),
            id_column: config.id_column.clone(),
            fill_absent: false,
        }
    }

    /// Also insert every defaulted column missing from the frame.
    ///
    /// Used at inference where a record carries only a handful of fields.
    pub fn with_fill_absent(mut self, fill_absent: bool) -> Self {
        self.fill_absent = fill_absent;
        self
    }

    /// Compute median / mode defaults for every feature column.
    ///
    /// Columns with no valid value get no default.
    pub fn fit(&self, df: &DataFrame) -> Result<ImputationDefaults> {
        let mut defaults = ImputationDefaults::default();

        for col_name in column_names(df) {
            if col_name == self.target_column || col_name == self.id_column {
                continue;
            }
            let dtype = df.column(&col_name)?.dtype().clone();
            match get_dtype_category(&dtype) {
                DtypeCategory::Numeric => {
                    if let Some(median) = StatisticalImputer::numeric_median(df, &col_name)? {
                        defaults.numeric.insert(col_name, median);
                    }
                }
                DtypeCategory::String => {
                    if let Some(mode) = StatisticalImputer::categorical_mode(df, &col_name)? {
                        defaults.categorical.insert(col_name, mode);
                    }
                }
                DtypeCategory::Boolean | DtypeCategory::Other => {
                    debug!("No imputation default for '{}' ({:?})", col_name, dtype);
                }
            }
        }

        debug!(
            "Fitted {} numeric and {} categorical defaults",
            defaults.numeric.len(),
            defaults.categorical.len()
        );
        Ok(defaults)
    }

    /// Fill nulls from the frozen defaults.
    pub fn apply(&self, df: &mut DataFrame, defaults: &ImputationDefaults) -> Result<CleaningReport> {
        let mut report = CleaningReport::default();

        for (col_name, value) in &defaults.numeric {
            if has_column(df, col_name) {
                report.imputed_cells +=
                    StatisticalImputer::fill_numeric(df, col_name, *value, &mut report.steps)?;
            } else if self.fill_absent {
                StatisticalImputer::insert_numeric_constant(df, col_name, *value)?;
                report.inserted_columns.push(col_name.clone());
            }
        }

        for (col_name, value) in &defaults.categorical {
            if has_column(df, col_name) {
                report.imputed_cells +=
                    StatisticalImputer::fill_categorical(df, col_name, value, &mut report.steps)?;
            } else if self.fill_absent {
                StatisticalImputer::insert_categorical_constant(df, col_name, value)?;
                report.inserted_columns.push(col_name.clone());
            }
        }

        if !report.inserted_columns.is_empty() {
            report.steps.push(format!(
                "Inserted {} absent columns from training defaults",
                report.inserted_columns.len()
            ));
        }

        debug!(
            "Cleaner filled {} cells, inserted {} columns",
            report.imputed_cells,
            report.inserted_columns.len()
        );
        Ok(report)
    }

    /// Drop rows whose target is null. Returns the number of rows dropped.
    pub fn drop_missing_target(&self, df: &mut DataFrame) -> Result<usize> {
        let values = numeric_values(df, &self.target_column)?
            .ok_or_else(|| ProcessingError::Schema(self.target_column.clone()))?;

        let mask: BooleanChunked = values.iter().map(|v| Some(v.is_some())).collect();
        let before = df.height();
        *df = df.filter(&mask)?;
        let dropped = before - df.height();

        if dropped > 0 {
            info!("Dropped {} rows without '{}'", dropped, self.target_column);
        }
        Ok(dropped)
    }

    /// Remove rows whose target lies outside `[max(0, Q1 - k*IQR), Q3 + k*IQR]`.
    ///
    /// Null targets are kept here; [`Cleaner::drop_missing_target`] handles them.
    pub fn remove_target_outliers(
        df: &mut DataFrame,
        target: &str,
        multiplier: f64,
    ) -> Result<OutlierReport> {
        let values =
            numeric_values(df, target)?.ok_or_else(|| ProcessingError::Schema(target.to_string()))?;
        let rows_before = df.height();

        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let Some(fence) = IqrFence::from_values(&present, multiplier) else {
            return Ok(OutlierReport {
                fence: None,
                rows_before,
                rows_removed: 0,
            });
        };

        let mask: BooleanChunked = values
            .iter()
            .map(|v| Some(v.map(|x| fence.contains(x)).unwrap_or(true)))
            .collect();
        *df = df.filter(&mask)?;

        let rows_removed = rows_before - df.height();
        info!(
            "Removed {} '{}' outliers outside [{:.2}, {:.2}]",
            rows_removed, target, fence.lower, fence.upper
        );

        Ok(OutlierReport {
            fence: Some(fence),
            rows_before,
            rows_removed,
        })
    }
}
