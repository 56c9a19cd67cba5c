//! Exploratory analysis of a raw housing table.
//!
//! Produces per-column null counts, numeric summaries, value frequencies and
//! the rank correlation of every numeric column with the target, plus a text
//! report.

mod statistics;

pub use statistics::{HistogramBin, NumericSummary};

use crate::cleaner::IqrFence;
use crate::error::Result;
use crate::utils::{
    DtypeCategory, column_names, get_dtype_category, numeric_values, string_values,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statistics::{histogram, spearman};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use tracing::debug;

/// Number of equal-width bins of the target histogram.
pub const TARGET_HISTOGRAM_BINS: usize = 10;

/// Most frequent labels listed per categorical column.
const TOP_VALUES: usize = 10;

/// Verbal strength of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationStrength {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    VeryWeak,
}

impl CorrelationStrength {
    /// Interpret the absolute value of a coefficient.
    pub fn from_coefficient(coefficient: f64) -> Self {
        match coefficient.abs() {
            c if c >= 0.8 => Self::VeryStrong,
            c if c >= 0.6 => Self::Strong,
            c if c >= 0.4 => Self::Moderate,
            c if c >= 0.2 => Self::Weak,
            _ => Self::VeryWeak,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryStrong => "Very strong",
            Self::Strong => "Strong",
            Self::Moderate => "Moderate",
            Self::Weak => "Weak",
            Self::VeryWeak => "Very weak",
        }
    }
}

/// Analysis of one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAnalysis {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    pub numeric: Option<NumericSummary>,
    /// Label frequencies, most frequent first.
    pub top_values: Vec<(String, usize)>,
    /// Spearman correlation with the target.
    pub target_correlation: Option<f64>,
}

impl ColumnAnalysis {
    pub fn correlation_strength(&self) -> Option<CorrelationStrength> {
        self.target_correlation
            .map(CorrelationStrength::from_coefficient)
    }
}

/// Target distribution with the 1.5 and 2.0 IQR fences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAnalysis {
    pub name: String,
    pub summary: NumericSummary,
    pub fence_1_5: IqrFence,
    pub fence_2_0: IqrFence,
    pub histogram: Vec<HistogramBin>,
}

/// Whole-table analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetAnalysis {
    pub rows: usize,
    pub columns: usize,
    /// Number of columns per dtype.
    pub type_overview: BTreeMap<String, usize>,
    pub column_analyses: Vec<ColumnAnalysis>,
    pub target: Option<TargetAnalysis>,
}

impl DatasetAnalysis {
    /// Analyze every column. The target is optional; without it no
    /// correlations are computed.
    pub fn analyze(df: &DataFrame, target: &str) -> Result<Self> {
        let target_values = numeric_values(df, target)?;
        let mut type_overview: BTreeMap<String, usize> = BTreeMap::new();
        let mut column_analyses = Vec::with_capacity(df.width());

        for name in column_names(df) {
            let column = df.column(&name)?;
            let dtype = column.dtype().clone();
            let dtype_label = match get_dtype_category(&dtype) {
                DtypeCategory::String => "category".to_string(),
                _ => dtype.to_string(),
            };
            *type_overview.entry(dtype_label.clone()).or_insert(0) += 1;

            let null_count = column.null_count();
            let mut analysis = ColumnAnalysis {
                name: name.clone(),
                dtype: dtype_label,
                null_count,
                null_percentage: if df.height() > 0 {
                    null_count as f64 / df.height() as f64 * 100.0
                } else {
                    0.0
                },
                unique_count: column.as_materialized_series().drop_nulls().n_unique()?,
                numeric: None,
                top_values: Vec::new(),
                target_correlation: None,
            };

            match get_dtype_category(&dtype) {
                DtypeCategory::Numeric | DtypeCategory::Boolean => {
                    let values = numeric_values(df, &name)?.unwrap_or_default();
                    let present: Vec<f64> = values.iter().flatten().copied().collect();
                    analysis.numeric = NumericSummary::from_values(&present);

                    if name != target
                        && let Some(target_values) = &target_values
                    {
                        let (x, y): (Vec<f64>, Vec<f64>) = values
                            .iter()
                            .zip(target_values)
                            .filter_map(|(v, t)| Some(((*v)?, (*t)?)))
                            .unzip();
                        analysis.target_correlation = spearman(&x, &y);
                    }
                }
                DtypeCategory::String => {
                    analysis.top_values = value_frequencies(df, &name)?;
                }
                DtypeCategory::Other => {}
            }

            column_analyses.push(analysis);
        }

        let target = match &target_values {
            Some(values) => Self::analyze_target(target, values),
            None => None,
        };

        debug!("Analyzed {} columns", column_analyses.len());
        Ok(Self {
            rows: df.height(),
            columns: df.width(),
            type_overview,
            column_analyses,
            target,
        })
    }

    fn analyze_target(name: &str, values: &[Option<f64>]) -> Option<TargetAnalysis> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        Some(TargetAnalysis {
            name: name.to_string(),
            summary: NumericSummary::from_values(&present)?,
            fence_1_5: IqrFence::from_values(&present, 1.5)?,
            fence_2_0: IqrFence::from_values(&present, 2.0)?,
            histogram: histogram(&present, TARGET_HISTOGRAM_BINS),
        })
    }

    /// Columns ordered by absolute target correlation, strongest first.
    pub fn strongest_correlations(&self, limit: usize) -> Vec<&ColumnAnalysis> {
        let mut correlated: Vec<&ColumnAnalysis> = self
            .column_analyses
            .iter()
            .filter(|c| c.target_correlation.is_some())
            .collect();
        correlated.sort_by(|a, b| {
            let a = a.target_correlation.unwrap_or(0.0).abs();
            let b = b.target_correlation.unwrap_or(0.0).abs();
            b.total_cmp(&a)
        });
        correlated.truncate(limit);
        correlated
    }

    /// Plain-text report.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(80);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "DATASET ANALYSIS");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Rows                  {}", self.rows);
        let _ = writeln!(out, "Columns               {}", self.columns);
        let _ = writeln!(out);

        let _ = writeln!(out, "Types");
        let _ = writeln!(out, "-----");
        for (dtype, count) in &self.type_overview {
            let pct = *count as f64 / self.columns.max(1) as f64 * 100.0;
            let _ = writeln!(out, "{dtype:<12} {count:>5} ({pct:.2} %)");
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Column name          Null entries        Column type");
        for column in &self.column_analyses {
            let _ = writeln!(
                out,
                "{:<20} {:>8} ({:>5.2} %)  {}",
                column.name, column.null_count, column.null_percentage, column.dtype
            );
        }
        let _ = writeln!(out);

        if let Some(target) = &self.target {
            let s = &target.summary;
            let _ = writeln!(out, "{}", target.name);
            let _ = writeln!(out, "{}", "-".repeat(target.name.len()));
            let _ = writeln!(out, "Min                   {:>14.2}", s.min);
            let _ = writeln!(out, "Mean                  {:>14.2}", s.mean);
            let _ = writeln!(out, "Median                {:>14.2}", s.median);
            let _ = writeln!(out, "Max                   {:>14.2}", s.max);
            let _ = writeln!(
                out,
                "Std. dev              {:>14.2} ({:.2} %)",
                s.std, s.relative_std
            );
            let _ = writeln!(out, "Skewness              {:>14.2}", s.skewness);
            let _ = writeln!(
                out,
                "1.5 x IQR bounds      [{:.2}, {:.2}]",
                target.fence_1_5.lower, target.fence_1_5.upper
            );
            let _ = writeln!(
                out,
                "2.0 x IQR bounds      [{:.2}, {:.2}]",
                target.fence_2_0.lower, target.fence_2_0.upper
            );
            let _ = writeln!(out, "Histogram");
            for bin in &target.histogram {
                let _ = writeln!(
                    out,
                    "  {:>12.0} - {:>12.0}  {:>6}",
                    bin.lower, bin.upper, bin.count
                );
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "Correlation with target (Spearman)");
        let _ = writeln!(out, "----------------------------------");
        for column in self.strongest_correlations(usize::MAX) {
            if let (Some(coefficient), Some(strength)) =
                (column.target_correlation, column.correlation_strength())
            {
                let _ = writeln!(
                    out,
                    "{:<20} {:>6.2} ({})",
                    column.name,
                    coefficient,
                    strength.label()
                );
            }
        }
        let _ = writeln!(out);

        for column in &self.column_analyses {
            if column.top_values.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}", column.name);
            let _ = writeln!(out, "{}", "-".repeat(column.name.len()));
            let total: usize = self.rows.max(1);
            for (value, count) in &column.top_values {
                let pct = *count as f64 / total as f64 * 100.0;
                let _ = writeln!(out, "{value:<15} {count:>8} ({pct:.2} %)");
            }
            let _ = writeln!(out);
        }

        out
    }
}

/// Label counts, most frequent first, ties by label.
fn value_frequencies(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in string_values(df, column)?.unwrap_or_default().into_iter().flatten() {
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut frequencies: Vec<(String, usize)> = counts.into_iter().collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequencies.truncate(TOP_VALUES);
    Ok(frequencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df![
            "Id" => [1i64, 2, 3, 4, 5],
            "OverallQual" => [5i64, 6, 7, 8, 9],
            "LotFrontage" => [Some(60.0), None, Some(70.0), Some(50.0), Some(90.0)],
            "Street" => ["Pave", "Pave", "Grvl", "Pave", "Grvl"],
            "SalePrice" => [100000.0, 120000.0, 150000.0, 200000.0, 260000.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_correlation_strength_thresholds() {
        assert_eq!(CorrelationStrength::from_coefficient(0.8), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::from_coefficient(-0.65), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::from_coefficient(0.4), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::from_coefficient(0.2), CorrelationStrength::Weak);
        assert_eq!(CorrelationStrength::from_coefficient(0.19), CorrelationStrength::VeryWeak);
    }

    #[test]
    fn test_analyze_columns() {
        let analysis = DatasetAnalysis::analyze(&sample(), "SalePrice").unwrap();

        assert_eq!(analysis.rows, 5);
        assert_eq!(analysis.type_overview["category"], 1);

        let frontage = &analysis.column_analyses[2];
        assert_eq!(frontage.null_count, 1);
        assert_eq!(frontage.null_percentage, 20.0);
        assert_eq!(frontage.unique_count, 4);

        let quality = &analysis.column_analyses[1];
        assert!((quality.target_correlation.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(quality.correlation_strength(), Some(CorrelationStrength::VeryStrong));

        let street = &analysis.column_analyses[3];
        assert_eq!(
            street.top_values,
            vec![("Pave".to_string(), 3), ("Grvl".to_string(), 2)]
        );
        assert!(street.target_correlation.is_none());
    }

    #[test]
    fn test_target_analysis() {
        let analysis = DatasetAnalysis::analyze(&sample(), "SalePrice").unwrap();
        let target = analysis.target.as_ref().unwrap();

        assert_eq!(target.summary.median, 150000.0);
        assert_eq!(
            target.histogram.iter().map(|b| b.count).sum::<usize>(),
            5
        );
        assert!(target.fence_2_0.upper > target.fence_1_5.upper);
    }

    #[test]
    fn test_strongest_correlations_and_report() {
        let analysis = DatasetAnalysis::analyze(&sample(), "SalePrice").unwrap();
        let strongest = analysis.strongest_correlations(1);
        assert_eq!(strongest.len(), 1);
        assert!(strongest[0].name == "OverallQual" || strongest[0].name == "Id");

        let report = analysis.render_report();
        assert!(report.contains("DATASET ANALYSIS"));
        assert!(report.contains("Very strong"));
        assert!(report.contains("Pave"));
    }

    #[test]
    fn test_analyze_without_target() {
        let df = sample().drop("SalePrice").unwrap();
        let analysis = DatasetAnalysis::analyze(&df, "SalePrice").unwrap();
        assert!(analysis.target.is_none());
        assert!(analysis.strongest_correlations(10).is_empty());
    }
}
