//! Ordinal encoding with a fixed category order table.

use crate::error::Result;
use crate::utils::{has_column, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label at rank 0 of every order, standing for "not present".
pub const ABSENT_LABEL: &str = "None";

const QUALITY_ORDER: &[&str] = &[ABSENT_LABEL, "Po", "Fa", "TA", "Gd", "Ex"];

const QUALITY_COLUMNS: &[&str] = &[
    "ExterQual",
    "ExterCond",
    "BsmtQual",
    "BsmtCond",
    "HeatingQC",
    "KitchenQual",
    "FireplaceQu",
    "GarageQual",
    "GarageCond",
    "PoolQC",
];

/// Total order of labels for each ordinal column.
///
/// The table is persisted with the model so training and inference rank
/// labels identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOrderTable {
    orders: BTreeMap<String, Vec<String>>,
}

impl Default for CategoryOrderTable {
    fn default() -> Self {
        Self::ames()
    }
}

impl CategoryOrderTable {
    /// Orders for the ordinal columns of the Ames housing layout.
    pub fn ames() -> Self {
        let mut table = Self::empty();
        for column in QUALITY_COLUMNS {
            table.insert(column, QUALITY_ORDER);
        }
        table.insert("BsmtExposure", &[ABSENT_LABEL, "No", "Mn", "Av", "Gd"]);
        for column in ["BsmtFinType1", "BsmtFinType2"] {
            table.insert(
                column,
                &[ABSENT_LABEL, "Unf", "LwQ", "Rec", "BLQ", "ALQ", "GLQ"],
            );
        }
        table.insert("GarageFinish", &[ABSENT_LABEL, "Unf", "RFn", "Fin"]);
        table.insert(
            "Functional",
            &[
                ABSENT_LABEL,
                "Sal",
                "Sev",
                "Maj2",
                "Maj1",
                "Mod",
                "Min2",
                "Min1",
                "Typ",
            ],
        );
        table.insert("Fence", &[ABSENT_LABEL, "MnWw", "GdWo", "MnPrv", "GdPrv"]);
        table
    }

    /// A table with no ordinal columns.
    pub fn empty() -> Self {
        Self {
            orders: BTreeMap::new(),
        }
    }

    /// Register an order. The sentinel is prepended when missing.
    pub fn insert(&mut self, column: &str, labels: &[&str]) {
        let mut order: Vec<String> = Vec::with_capacity(labels.len() + 1);
        if labels.first() != Some(&ABSENT_LABEL) {
            order.push(ABSENT_LABEL.to_string());
        }
        order.extend(labels.iter().map(|l| l.to_string()));
        self.orders.insert(column.to_string(), order);
    }

    /// Ordinal columns, sorted by name.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.orders.keys().map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.orders.contains_key(column)
    }

    pub fn order(&self, column: &str) -> Option<&[String]> {
        self.orders.get(column).map(Vec::as_slice)
    }

    /// Rank of a label. Unknown columns, unseen labels and nulls rank 0.
    pub fn rank(&self, column: &str, label: Option<&str>) -> i32 {
        let (Some(order), Some(label)) = (self.orders.get(column), label) else {
            return 0;
        };
        order
            .iter()
            .position(|l| l == label)
            .map(|p| p as i32)
            .unwrap_or(0)
    }

    /// Replace every ordinal column present in `df` with its `Int32` rank.
    ///
    /// Returns the encoded column names in table order.
    pub fn encode(&self, df: &mut DataFrame) -> Result<Vec<String>> {
        let mut encoded = Vec::new();
        for column in self.orders.keys() {
            if !has_column(df, column) {
                continue;
            }
            let Some(labels) = string_values(df, column)? else {
                continue;
            };
            let ranks: Vec<i32> = labels
                .iter()
                .map(|l| self.rank(column, l.as_deref()))
                .collect();
            df.replace(column, Series::new(column.as_str().into(), ranks))?;
            encoded.push(column.clone());
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sentinel_is_rank_zero() {
        let table = CategoryOrderTable::ames();
        for column in table.columns() {
            assert_eq!(table.order(column).unwrap()[0], ABSENT_LABEL);
        }
        assert_eq!(table.columns().count(), 16);
    }

    #[test]
    fn test_rank_quality_scale() {
        let table = CategoryOrderTable::ames();
        assert_eq!(table.rank("ExterQual", Some("Po")), 1);
        assert_eq!(table.rank("ExterQual", Some("Ex")), 5);
        assert_eq!(table.rank("BsmtFinType1", Some("GLQ")), 6);
        assert_eq!(table.rank("Functional", Some("Typ")), 8);
    }

    #[test]
    fn test_unseen_label_and_null_rank_zero() {
        let table = CategoryOrderTable::ames();
        assert_eq!(table.rank("KitchenQual", Some("Superb")), 0);
        assert_eq!(table.rank("KitchenQual", None), 0);
        assert_eq!(table.rank("NotOrdinal", Some("Gd")), 0);
    }

    #[test]
    fn test_insert_prepends_sentinel() {
        let mut table = CategoryOrderTable::empty();
        table.insert("Finish", &["Rough", "Smooth"]);
        assert_eq!(
            table.order("Finish").unwrap(),
            &["None".to_string(), "Rough".to_string(), "Smooth".to_string()]
        );
    }

    #[test]
    fn test_encode_replaces_with_ranks() {
        let mut df = df![
            "KitchenQual" => [Some("Gd"), Some("Excellent"), None],
            "Street" => ["Pave", "Pave", "Grvl"],
        ]
        .unwrap();

        let encoded = CategoryOrderTable::ames().encode(&mut df).unwrap();

        assert_eq!(encoded, vec!["KitchenQual".to_string()]);
        let ranks: Vec<Option<i32>> = df
            .column("KitchenQual")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ranks, vec![Some(4), Some(0), Some(0)]);
        assert_eq!(df.column("Street").unwrap().dtype(), &DataType::String);
    }
}
