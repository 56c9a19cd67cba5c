//! Categorical encoding.
//!
//! Ordinal columns become integer ranks from a [`CategoryOrderTable`]; every
//! other string column is one-hot encoded. The width of the result depends on
//! which labels the table contains, so encoded tables must go through
//! [`crate::schema::SchemaAligner`] before reaching a model.

mod one_hot;
mod ordinal;

pub use one_hot::{dummies, dummy_name};
pub use ordinal::{ABSENT_LABEL, CategoryOrderTable};

use crate::error::Result;
use crate::utils::{DtypeCategory, column_names, get_dtype_category};
use polars::prelude::*;
use tracing::debug;

/// Summary of an encoding pass.
#[derive(Debug, Clone, Default)]
pub struct EncodingReport {
    pub ordinal_columns: Vec<String>,
    pub one_hot_sources: Vec<String>,
    pub indicator_columns: usize,
}

/// Encodes every string column of a table into numeric columns.
#[derive(Debug, Clone)]
pub struct Encoder<'a> {
    orders: &'a CategoryOrderTable,
}

impl<'a> Encoder<'a> {
    pub fn new(orders: &'a CategoryOrderTable) -> Self {
        Self { orders }
    }

    /// Encode a table. Indicator columns are appended after the remaining
    /// columns, grouped by source column in original column order.
    pub fn encode(&self, df: &DataFrame) -> Result<(DataFrame, EncodingReport)> {
        let mut result = df.clone();
        let mut report = EncodingReport {
            ordinal_columns: self.orders.encode(&mut result)?,
            ..Default::default()
        };

        let nominal: Vec<String> = column_names(&result)
            .into_iter()
            .filter(|name| {
                result
                    .column(name)
                    .map(|c| get_dtype_category(c.dtype()) == DtypeCategory::String)
                    .unwrap_or(false)
            })
            .collect();

        let mut indicators = Vec::new();
        for column in &nominal {
            indicators.extend(dummies(&result, column)?);
        }
        for column in &nominal {
            result.drop_in_place(column)?;
        }

        report.indicator_columns = indicators.len();
        for series in indicators {
            result.with_column(series)?;
        }
        report.one_hot_sources = nominal;

        debug!(
            "Encoded {} ordinal and {} nominal columns into {} indicators",
            report.ordinal_columns.len(),
            report.one_hot_sources.len(),
            report.indicator_columns
        );
        Ok((result, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_layout() {
        let df = df![
            "Id" => [1i64, 2],
            "MSZoning" => ["RL", "RM"],
            "ExterQual" => ["Gd", "TA"],
            "GrLivArea" => [1710.0, 1262.0],
            "Street" => ["Pave", "Pave"],
        ]
        .unwrap();

        let orders = CategoryOrderTable::ames();
        let (encoded, report) = Encoder::new(&orders).encode(&df).unwrap();

        assert_eq!(
            column_names(&encoded),
            vec![
                "Id",
                "ExterQual",
                "GrLivArea",
                "MSZoning_RL",
                "MSZoning_RM",
                "Street_Pave",
            ]
        );
        assert_eq!(report.ordinal_columns, vec!["ExterQual".to_string()]);
        assert_eq!(report.indicator_columns, 3);
    }

    #[test]
    fn test_single_row_only_yields_own_categories() {
        let df = df!["Neighborhood" => ["Blueste"]].unwrap();
        let orders = CategoryOrderTable::ames();

        let (encoded, _) = Encoder::new(&orders).encode(&df).unwrap();
        assert_eq!(column_names(&encoded), vec!["Neighborhood_Blueste"]);
    }

    #[test]
    fn test_no_string_columns_left() {
        let df = df![
            "KitchenQual" => [Some("Gd"), None],
            "Alley" => [None::<&str>, Some("Grvl")],
        ]
        .unwrap();
        let orders = CategoryOrderTable::ames();

        let (encoded, _) = Encoder::new(&orders).encode(&df).unwrap();
        for column in encoded.get_columns() {
            assert_ne!(column.dtype(), &DataType::String);
        }
    }
}
