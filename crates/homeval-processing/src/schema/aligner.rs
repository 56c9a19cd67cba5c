//! Projection of encoded tables onto a frozen schema.

use super::FeatureSchema;
use crate::error::{ProcessingError, Result};
use crate::utils::numeric_values;
use polars::prelude::*;
use tracing::trace;

/// Makes any encoded table match a [`FeatureSchema`] exactly.
pub struct SchemaAligner;

impl SchemaAligner {
    /// Output holds exactly the schema columns, in schema order, as `Float64`.
    ///
    /// Absent columns are zero, extra columns are dropped and nulls become 0.
    /// Aligning an aligned table returns it unchanged.
    pub fn align(df: &DataFrame, schema: &FeatureSchema) -> Result<DataFrame> {
        let height = df.height();
        let mut columns: Vec<Column> = Vec::with_capacity(schema.len());
        let mut zero_filled = 0usize;

        for name in schema.columns() {
            let values: Vec<f64> = match numeric_values(df, name)? {
                Some(values) => values.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
                None => {
                    zero_filled += 1;
                    vec![0.0; height]
                }
            };
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        let aligned = if columns.is_empty() {
            DataFrame::empty_with_height(height)
        } else {
            DataFrame::new(columns)?
        };
        Self::check(&aligned, schema)?;

        trace!(
            "Aligned {} rows to {} columns ({} zero-filled)",
            height,
            schema.len(),
            zero_filled
        );
        Ok(aligned)
    }

    /// Verify width and column order against the schema.
    pub fn check(df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
        if df.width() != schema.len() {
            return Err(ProcessingError::Alignment(format!(
                "expected {} columns, found {}",
                schema.len(),
                df.width()
            )));
        }
        for (actual, expected) in df.get_column_names().iter().zip(schema.columns()) {
            if actual.as_str() != expected {
                return Err(ProcessingError::Alignment(format!(
                    "expected column '{expected}', found '{actual}'"
                )));
            }
        }
        Ok(())
    }

    /// Row-major feature matrix of an aligned table.
    pub fn to_rows(df: &DataFrame, schema: &FeatureSchema) -> Result<Vec<Vec<f64>>> {
        Self::check(df, schema)?;
        let mut rows = vec![Vec::with_capacity(schema.len()); df.height()];
        for name in schema.columns() {
            let values = numeric_values(df, name)?
                .ok_or_else(|| ProcessingError::ColumnNotFound(name.clone()))?;
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value.unwrap_or(0.0));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            "GrLivArea".into(),
            "Neighborhood_Blueste".into(),
            "Neighborhood_CollgCr".into(),
            "HouseStyle_2Story".into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_align_fills_drops_and_orders() {
        let df = df![
            "HouseStyle_2Story" => [1i32],
            "Neighborhood_NoRidge" => [1i32],
            "GrLivArea" => [Some(1710.0)],
        ]
        .unwrap();

        let aligned = SchemaAligner::align(&df, &schema()).unwrap();

        assert_eq!(column_names(&aligned), schema().columns().to_vec());
        assert_eq!(
            SchemaAligner::to_rows(&aligned, &schema()).unwrap(),
            vec![vec![1710.0, 0.0, 0.0, 1.0]]
        );
        for column in aligned.get_columns() {
            assert_eq!(column.dtype(), &DataType::Float64);
        }
    }

    #[test]
    fn test_align_is_idempotent() {
        let df = df![
            "GrLivArea" => [Some(1710.0), None],
            "Neighborhood_CollgCr" => [1i32, 0],
            "Extra" => ["x", "y"],
        ]
        .unwrap();

        let once = SchemaAligner::align(&df, &schema()).unwrap();
        let twice = SchemaAligner::align(&once, &schema()).unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_nulls_become_zero() {
        let df = df!["GrLivArea" => [None::<f64>]].unwrap();
        let aligned = SchemaAligner::align(&df, &schema()).unwrap();
        assert_eq!(
            SchemaAligner::to_rows(&aligned, &schema()).unwrap()[0][0],
            0.0
        );
    }

    #[test]
    fn test_check_detects_mismatch() {
        let df = df!["GrLivArea" => [1.0]].unwrap();
        let err = SchemaAligner::check(&df, &schema()).unwrap_err();
        assert!(matches!(err, ProcessingError::Alignment(_)));
    }
}
