//! One-hot encoding of nominal string columns.

use crate::error::Result;
use crate::utils::string_values;
use polars::prelude::*;
use std::collections::BTreeSet;

/// Name of the indicator column for `value` of `column`.
pub fn dummy_name(column: &str, value: &str) -> String {
    format!("{column}_{value}")
}

/// Indicator columns for one source column, one per distinct non-null value
/// (sorted). Nulls are all-zero rows.
pub fn dummies(df: &DataFrame, column: &str) -> Result<Vec<Series>> {
    let Some(labels) = string_values(df, column)? else {
        return Ok(Vec::new());
    };

    let distinct: BTreeSet<&str> = labels.iter().flatten().map(String::as_str).collect();

    Ok(distinct
        .into_iter()
        .map(|value| {
            let indicator: Vec<i32> = labels
                .iter()
                .map(|l| i32::from(l.as_deref() == Some(value)))
                .collect();
            Series::new(dummy_name(column, value).into(), indicator)
        })
        .collect())
}
