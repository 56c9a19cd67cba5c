//! Statistical imputation methods.
//!
//! Median for numeric columns, mode for categorical columns. Values are
//! computed once on the training table and then applied as constants.

use crate::error::Result;
use crate::utils::{
    count_missing_numeric, fill_numeric_nulls, fill_string_nulls, has_column, median,
    numeric_values, string_mode, string_values,
};
use polars::prelude::*;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Median of a numeric column, ignoring nulls and non-finite values.
    ///
    /// `None` when the column is absent or has no valid values.
    pub fn numeric_median(df: &DataFrame, col_name: &str) -> Result<Option<f64>> {
        Ok(numeric_values(df, col_name)?.and_then(|values| median(&values)))
    }

    /// Most frequent label of a string column, ignoring nulls.
    pub fn categorical_mode(df: &DataFrame, col_name: &str) -> Result<Option<String>> {
        Ok(string_values(df, col_name)?.and_then(|values| string_mode(&values)))
    }

    /// Fill nulls of a numeric column with `fill_value`.
    ///
    /// Returns the number of cells filled. Columns without nulls keep their
    /// dtype untouched.
    pub fn fill_numeric(
        df: &mut DataFrame,
        col_name: &str,
        fill_value: f64,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        if !has_column(df, col_name) {
            return Ok(0);
        }
        let series = df.column(col_name)?.as_materialized_series().clone();
        // Strings that do not parse as numbers count as missing.
        let as_float = series.cast(&DataType::Float64)?;
        let null_count = count_missing_numeric(&as_float)?;
        if null_count == 0 {
            return Ok(0);
        }

        let filled = fill_numeric_nulls(&as_float, fill_value)?;
        df.replace(col_name, filled)?;

        processing_steps.push(format!(
            "Filled {} nulls in '{}' with median: {:.2}",
            null_count, col_name, fill_value
        ));
        Ok(null_count)
    }

    /// Fill nulls of a categorical column with `fill_value`.
    pub fn fill_categorical(
        df: &mut DataFrame,
        col_name: &str,
        fill_value: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        if !has_column(df, col_name) {
            return Ok(0);
        }
        let series = df.column(col_name)?.as_materialized_series().clone();
        let null_count = series.null_count();
        if null_count == 0 && series.dtype() == &DataType::String {
            return Ok(0);
        }

        let filled = fill_string_nulls(&series, fill_value)?;
        df.replace(col_name, filled)?;

        if null_count > 0 {
            processing_steps.push(format!(
                "Filled {} nulls in '{}' with mode: '{}'",
                null_count, col_name, fill_value
            ));
        }
        Ok(null_count)
    }

    /// Add a numeric column holding `value` on every row.
    pub fn insert_numeric_constant(df: &mut DataFrame, col_name: &str, value: f64) -> Result<()> {
        let series = Series::new(col_name.into(), vec![value; df.height()]);
        df.with_column(series)?;
        Ok(())
    }

    /// Add a string column holding `value` on every row.
    pub fn insert_categorical_constant(
        df: &mut DataFrame,
        col_name: &str,
        value: &str,
    ) -> Result<()> {
        let series = Series::new(col_name.into(), vec![value; df.height()]);
        df.with_column(series)?;
        Ok(())
    }
}
