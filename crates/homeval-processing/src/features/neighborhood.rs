//! Neighborhood price statistics frozen at training time.

use crate::error::{ProcessingError, Result};
use crate::utils::{median, numeric_values, sample_std, string_values};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column holding the neighborhood label.
pub const NEIGHBORHOOD_COLUMN: &str = "Neighborhood";

/// Aggregates for one neighborhood (or the whole table).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodRow {
    pub median_price: f64,
    pub mean_price: f64,
    /// Sample standard deviation; 0 for a single sale.
    pub price_std: f64,
    pub size: f64,
    pub avg_quality: f64,
}

impl NeighborhoodRow {
    fn from_group(prices: &[f64], qualities: &[f64]) -> Self {
        let present: Vec<Option<f64>> = prices.iter().map(|p| Some(*p)).collect();
        let size = prices.len() as f64;
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        Self {
            median_price: median(&present).unwrap_or(0.0),
            mean_price: mean(prices),
            price_std: sample_std(prices).unwrap_or(0.0),
            size,
            avg_quality: mean(qualities),
        }
    }
}

/// Per-neighborhood statistics plus a global fallback row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodStats {
    pub groups: BTreeMap<String, NeighborhoodRow>,
    pub global: NeighborhoodRow,
}

impl NeighborhoodStats {
    /// Group the training table by neighborhood.
    ///
    /// Rows with a null target are skipped. Without a neighborhood column
    /// only the global row is filled.
    pub fn fit(df: &polars::prelude::DataFrame, target: &str) -> Result<Self> {
        let prices = numeric_values(df, target)?
            .ok_or_else(|| ProcessingError::Schema(target.to_string()))?;
        let qualities = numeric_values(df, "OverallQual")?;
        let labels = string_values(df, NEIGHBORHOOD_COLUMN)?;

        let mut grouped: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        let mut all_prices = Vec::with_capacity(prices.len());
        let mut all_qualities = Vec::with_capacity(prices.len());

        for (idx, price) in prices.iter().enumerate() {
            let Some(price) = price else { continue };
            let quality = qualities.as_ref().and_then(|q| q[idx]);

            all_prices.push(*price);
            all_qualities.extend(quality);

            if let Some(label) = labels.as_ref().and_then(|l| l[idx].clone()) {
                let entry = grouped.entry(label).or_default();
                entry.0.push(*price);
                entry.1.extend(quality);
            }
        }

        let groups = grouped
            .into_iter()
            .map(|(label, (p, q))| (label, NeighborhoodRow::from_group(&p, &q)))
            .collect();

        Ok(Self {
            groups,
            global: NeighborhoodRow::from_group(&all_prices, &all_qualities),
        })
    }

    /// Row for a neighborhood; unknown or absent labels use the global row.
    pub fn lookup(&self, neighborhood: Option<&str>) -> &NeighborhoodRow {
        neighborhood
            .and_then(|n| self.groups.get(n))
            .unwrap_or(&self.global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn sales() -> DataFrame {
        df![
            "Neighborhood" => ["NAmes", "NAmes", "NAmes", "CollgCr"],
            "OverallQual" => [5i64, 6, 7, 8],
            "SalePrice" => [150000.0, 160000.0, 170000.0, 250000.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_fit_groups_by_neighborhood() {
        let stats = NeighborhoodStats::fit(&sales(), "SalePrice").unwrap();

        let names = stats.lookup(Some("NAmes"));
        assert_eq!(names.median_price, 160000.0);
        assert_eq!(names.mean_price, 160000.0);
        assert_eq!(names.price_std, 10000.0);
        assert_eq!(names.size, 3.0);
        assert_eq!(names.avg_quality, 6.0);

        let college = stats.lookup(Some("CollgCr"));
        assert_eq!(college.price_std, 0.0);
        assert_eq!(college.size, 1.0);
    }

    #[test]
    fn test_unknown_neighborhood_uses_global_row() {
        let stats = NeighborhoodStats::fit(&sales(), "SalePrice").unwrap();

        assert_eq!(stats.lookup(Some("Blueste")), &stats.global);
        assert_eq!(stats.lookup(None), &stats.global);
        assert_eq!(stats.global.size, 4.0);
        assert_eq!(stats.global.median_price, 165000.0);
    }

    #[test]
    fn test_fit_requires_target() {
        let df = df!["Neighborhood" => ["NAmes"]].unwrap();
        let err = NeighborhoodStats::fit(&df, "SalePrice").unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
    }
}
