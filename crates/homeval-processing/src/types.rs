use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Raw Records
// ============================================================================

/// A single scalar from a raw listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

/// One property listing: column name to scalar.
///
/// Missing values are not materialized in the frame built by
/// [`RawRecord::to_dataframe`]; the cleaner treats an absent column exactly
/// like a null one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    values: BTreeMap<String, RawValue>,
}

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.values.insert(column.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    /// Numeric value of a column, if it holds one.
    pub fn number(&self, column: &str) -> Option<f64> {
        match self.values.get(column) {
            Some(RawValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a record from a JSON object such as `{"OverallQual": 7, "Neighborhood": "CollgCr"}`.
    ///
    /// Non-scalar JSON values are treated as missing.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = RawRecord::new();
        for (key, val) in object {
            let raw = match val {
                serde_json::Value::Number(n) => n.as_f64().into(),
                serde_json::Value::String(s) => RawValue::Text(s.clone()),
                serde_json::Value::Bool(b) => RawValue::Number(if *b { 1.0 } else { 0.0 }),
                _ => RawValue::Missing,
            };
            record.insert(key.clone(), raw);
        }
        Some(record)
    }

    /// Convert into a one-row DataFrame.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .values
            .iter()
            .filter_map(|(name, value)| match value {
                RawValue::Number(v) => Some(Series::new(name.as_str().into(), &[*v]).into()),
                RawValue::Text(s) => {
                    Some(Series::new(name.as_str().into(), &[s.as_str()]).into())
                }
                RawValue::Missing => None,
            })
            .collect();

        if columns.is_empty() {
            // Keep one row so the cleaner can still materialize defaults.
            return Ok(DataFrame::empty_with_height(1));
        }

        DataFrame::new(columns)
    }
}

// ============================================================================
// Preparation Summary
// ============================================================================

/// Human-readable summary of what a preparation run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationSummary {
    /// Number of rows before preparation.
    pub rows_before: usize,
    /// Number of rows after preparation.
    pub rows_after: usize,
    /// Rows dropped because the target was missing.
    pub missing_target_rows: usize,
    /// Rows dropped by the target outlier rule.
    pub outliers_removed: usize,
    /// Number of columns before preparation.
    pub columns_before: usize,
    /// Number of feature columns after encoding.
    pub columns_after: usize,
    /// Number of null cells filled by the cleaner.
    pub imputed_cells: usize,
    /// Columns added by the feature engineer.
    pub engineered_features: usize,
    /// Steps taken, in order.
    pub steps: Vec<String>,
}

impl PreparationSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step.
    pub fn add_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    /// Calculate the percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_before - self.rows_after) as f64 / self.rows_before as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_to_dataframe_skips_missing() {
        let record = RawRecord::new()
            .with("OverallQual", 7)
            .with("Neighborhood", "CollgCr")
            .with("LotFrontage", RawValue::Missing);

        let df = record.to_dataframe().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 2);
        assert_eq!(
            df.column("Neighborhood").unwrap().str().unwrap().get(0),
            Some("CollgCr")
        );
    }

    #[test]
    fn test_empty_record_still_has_one_row() {
        let df = RawRecord::new().to_dataframe().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 0);
    }

    #[test]
    fn test_record_from_json() {
        let json = serde_json::json!({
            "OverallQual": 7,
            "GrLivArea": 1710.0,
            "HouseStyle": "2Story",
            "Alley": null
        });
        let record = RawRecord::from_json(&json).unwrap();
        assert_eq!(record.number("OverallQual"), Some(7.0));
        assert_eq!(record.get("HouseStyle"), Some(&RawValue::Text("2Story".into())));
        assert_eq!(record.get("Alley"), Some(&RawValue::Missing));
    }

    #[test]
    fn test_summary_rows_removed_percentage() {
        let summary = PreparationSummary {
            rows_before: 200,
            rows_after: 150,
            ..Default::default()
        };
        assert_eq!(summary.rows_removed_percentage(), 25.0);
        assert_eq!(PreparationSummary::new().rows_removed_percentage(), 0.0);
    }
}
