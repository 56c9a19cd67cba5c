//! Evaluation of validation predictions.
//!
//! Training writes the held-out rows as two CSV files keyed by `Id`:
//! `validation_predictions.csv` and `validation_actual.csv`. An
//! [`EvaluationReport`] is built from those files (or directly from a
//! [`ValidationSet`]) and rendered as `evaluation_report.txt`.

use crate::error::{LearningError, Result};
use crate::metrics::{self, check_pairs};
use crate::types::ValidationSet;
use homeval_processing::io::{load_csv, write_csv};
use homeval_processing::utils::numeric_values;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

pub const PREDICTIONS_FILE: &str = "validation_predictions.csv";
pub const ACTUAL_FILE: &str = "validation_actual.csv";
pub const REPORT_FILE: &str = "evaluation_report.txt";
pub const FULL_RESULTS_FILE: &str = "full_evaluation_results.csv";

const ID_COLUMN: &str = "Id";
const PRICE_COLUMN: &str = "SalePrice";

/// Number of rows listed in the worst-predictions table.
pub const WORST_COUNT: usize = 10;
/// Number of rows listed in the best-predictions table.
pub const BEST_COUNT: usize = 5;

/// Actual-price ranges, each `(lower, upper]`.
const PRICE_RANGES: [(f64, f64, &str); 6] = [
    (0.0, 100_000.0, "<$100k"),
    (100_000.0, 150_000.0, "$100-150k"),
    (150_000.0, 200_000.0, "$150-200k"),
    (200_000.0, 250_000.0, "$200-250k"),
    (250_000.0, 300_000.0, "$250-300k"),
    (300_000.0, 1_000_000.0, ">$300k"),
];

/// One validation row with its errors. `error` is predicted minus actual.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub id: i64,
    pub actual: f64,
    pub predicted: f64,
    pub error: f64,
    pub abs_error: f64,
    pub percent_error: f64,
    pub abs_percent_error: f64,
}

impl EvaluationRecord {
    pub fn new(id: i64, actual: f64, predicted: f64) -> Self {
        let error = predicted - actual;
        let percent_error = if actual == 0.0 { 0.0 } else { error / actual * 100.0 };
        Self {
            id,
            actual,
            predicted,
            error,
            abs_error: error.abs(),
            percent_error,
            abs_percent_error: percent_error.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Percent.
    pub mape: f64,
    /// Mean of predicted minus actual; positive means overestimation.
    pub mean_error: f64,
    /// Population standard deviation of the errors.
    pub std_error: f64,
    pub max_abs_error: f64,
    pub min_abs_error: f64,
}

/// Rows whose absolute percentage error is at most 5, 10 and 15 percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccuracyBands {
    pub within_5: usize,
    pub within_10: usize,
    pub within_15: usize,
    pub total: usize,
}

impl AccuracyBands {
    fn share(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

/// Mean absolute percentage error of one actual-price range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRangeError {
    pub label: String,
    pub count: usize,
    /// `None` when no row falls in the range.
    pub mape: Option<f64>,
}

/// Complete evaluation of a validation partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub generated_at: String,
    pub records: Vec<EvaluationRecord>,
    pub metrics: EvaluationMetrics,
    pub accuracy: AccuracyBands,
    pub price_ranges: Vec<PriceRangeError>,
    /// Highest absolute percentage errors first.
    pub worst: Vec<EvaluationRecord>,
    /// Lowest absolute percentage errors first.
    pub best: Vec<EvaluationRecord>,
}

impl EvaluationReport {
    /// Evaluate paired ids, actual prices and predictions.
    pub fn evaluate(ids: &[i64], actual: &[f64], predicted: &[f64]) -> Result<Self> {
        check_pairs(actual, predicted)?;
        if ids.len() != actual.len() {
            return Err(LearningError::InvalidData(format!(
                "{} ids for {} rows",
                ids.len(),
                actual.len()
            )));
        }

        let records: Vec<EvaluationRecord> = ids
            .iter()
            .zip(actual.iter().zip(predicted))
            .map(|(&id, (&a, &p))| EvaluationRecord::new(id, a, p))
            .collect();

        let n = records.len() as f64;
        let mean_error = records.iter().map(|r| r.error).sum::<f64>() / n;
        let std_error = (records
            .iter()
            .map(|r| (r.error - mean_error).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        let abs_errors = records.iter().map(|r| r.abs_error);

        let metrics = EvaluationMetrics {
            rmse: metrics::mse(actual, predicted).sqrt(),
            mae: metrics::mae(actual, predicted),
            r2: metrics::r2(actual, predicted),
            mape: metrics::mape(actual, predicted),
            mean_error,
            std_error,
            max_abs_error: abs_errors.clone().fold(f64::NEG_INFINITY, f64::max),
            min_abs_error: abs_errors.fold(f64::INFINITY, f64::min),
        };

        let within = |limit: f64| {
            records
                .iter()
                .filter(|r| r.abs_percent_error <= limit)
                .count()
        };
        let accuracy = AccuracyBands {
            within_5: within(5.0),
            within_10: within(10.0),
            within_15: within(15.0),
            total: records.len(),
        };

        let price_ranges = PRICE_RANGES
            .iter()
            .map(|&(lower, upper, label)| {
                let errors: Vec<f64> = records
                    .iter()
                    .filter(|r| r.actual > lower && r.actual <= upper)
                    .map(|r| r.abs_percent_error)
                    .collect();
                PriceRangeError {
                    label: label.to_string(),
                    count: errors.len(),
                    mape: (!errors.is_empty())
                        .then(|| errors.iter().sum::<f64>() / errors.len() as f64),
                }
            })
            .collect();

        let mut by_error = records.clone();
        by_error.sort_by(|a, b| b.abs_percent_error.total_cmp(&a.abs_percent_error));
        let worst = by_error.iter().take(WORST_COUNT).cloned().collect();
        let best = by_error.iter().rev().take(BEST_COUNT).cloned().collect();

        Ok(Self {
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            records,
            metrics,
            accuracy,
            price_ranges,
            worst,
            best,
        })
    }

    pub fn from_validation_set(set: &ValidationSet) -> Result<Self> {
        Self::evaluate(&set.ids, &set.actual, &set.predicted)
    }

    /// Load the validation CSVs from `dir`, join them on `Id` and evaluate.
    ///
    /// Rows are kept in the order of the actual-price file; ids missing
    /// from either file are dropped.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let actual_path = dir.join(ACTUAL_FILE);
        let predictions_path = dir.join(PREDICTIONS_FILE);
        for path in [&predictions_path, &actual_path] {
            if !path.is_file() {
                return Err(LearningError::InvalidData(format!(
                    "{} not found: train the model first",
                    path.display()
                )));
            }
        }

        let actual = id_price_pairs(&load_csv(&actual_path)?)?;
        let predicted: HashMap<i64, f64> =
            id_price_pairs(&load_csv(&predictions_path)?)?.into_iter().collect();

        let mut ids = Vec::with_capacity(actual.len());
        let mut actual_prices = Vec::with_capacity(actual.len());
        let mut predicted_prices = Vec::with_capacity(actual.len());
        for (id, price) in actual {
            if let Some(p) = predicted.get(&id) {
                ids.push(id);
                actual_prices.push(price);
                predicted_prices.push(*p);
            }
        }

        info!("Loaded {} validation rows from {}", ids.len(), dir.display());
        Self::evaluate(&ids, &actual_prices, &predicted_prices)
    }

    /// Plain-text report.
    pub fn render(&self) -> String {
        let m = &self.metrics;
        let a = &self.accuracy;
        let mut out = String::new();

        let _ = writeln!(out, "MODEL EVALUATION REPORT");
        let _ = writeln!(out, "{}", "=".repeat(80));
        let _ = writeln!(out, "\nDate: {}\n", self.generated_at);

        section(&mut out, "OVERALL PERFORMANCE METRICS");
        let _ = writeln!(out, "RMSE (Root Mean Squared Error):     ${:.2}", m.rmse);
        let _ = writeln!(out, "MAE (Mean Absolute Error):          ${:.2}", m.mae);
        let _ = writeln!(out, "R-squared Score:                    {:.4}", m.r2);
        let _ = writeln!(out, "MAPE (Mean Abs Percentage Error):   {:.2}%", m.mape);
        let _ = writeln!(out, "Mean Error (Bias):                  ${:.2}", m.mean_error);
        let _ = writeln!(out, "Std Dev of Errors:                  ${:.2}", m.std_error);
        let _ = writeln!(out, "Maximum Absolute Error:             ${:.2}", m.max_abs_error);
        let _ = writeln!(out, "Minimum Absolute Error:             ${:.2}", m.min_abs_error);

        section(&mut out, "VALIDATION SET SUMMARY");
        let (actual_min, actual_max, actual_mean) = range(self.records.iter().map(|r| r.actual));
        let (pred_min, pred_max, pred_mean) = range(self.records.iter().map(|r| r.predicted));
        let _ = writeln!(out, "Number of Houses:         {}", self.records.len());
        let _ = writeln!(out, "Actual Price Range:       ${actual_min:.0} - ${actual_max:.0}");
        let _ = writeln!(out, "Predicted Price Range:    ${pred_min:.0} - ${pred_max:.0}");
        let _ = writeln!(out, "Mean Actual Price:        ${actual_mean:.0}");
        let _ = writeln!(out, "Mean Predicted Price:     ${pred_mean:.0}");

        section(&mut out, "PREDICTION ACCURACY");
        for (limit, count) in [(5, a.within_5), (10, a.within_10), (15, a.within_15)] {
            let _ = writeln!(
                out,
                "Houses within {limit:>2}% error:  {count} ({:.1}%)",
                a.share(count)
            );
        }

        section(&mut out, &format!("TOP {WORST_COUNT} WORST PREDICTIONS (Highest % Error)"));
        prediction_table(&mut out, &self.worst);

        section(&mut out, &format!("TOP {BEST_COUNT} BEST PREDICTIONS (Lowest % Error)"));
        prediction_table(&mut out, &self.best);

        section(&mut out, "PRICE RANGE ANALYSIS");
        let _ = writeln!(out, "{:<12} {:>8} {:>8}", "Range", "MAPE", "Count");
        for bin in &self.price_ranges {
            let mape = bin
                .mape
                .map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"));
            let _ = writeln!(out, "{:<12} {:>8} {:>8}", bin.label, mape, bin.count);
        }

        section(&mut out, "INTERPRETATION");
        let _ = writeln!(
            out,
            "- An R-squared of {:.3} means the model explains {:.1}% of the variance in house prices",
            m.r2,
            m.r2 * 100.0
        );
        let _ = writeln!(
            out,
            "- The average prediction error is ${:.0} or {:.1}% of the house price",
            m.mae, m.mape
        );
        let direction = if m.mean_error > 0.0 { "overestimates" } else { "underestimates" };
        let _ = writeln!(
            out,
            "- The model slightly {direction} prices on average by ${:.0}",
            m.mean_error.abs()
        );

        out
    }

    /// Write the text report and the per-row results into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(REPORT_FILE), self.render())?;

        let mut full = df![
            "Id" => self.records.iter().map(|r| r.id).collect::<Vec<_>>(),
            "Actual" => self.records.iter().map(|r| r.actual).collect::<Vec<_>>(),
            "Predicted" => self.records.iter().map(|r| r.predicted).collect::<Vec<_>>(),
            "Error" => self.records.iter().map(|r| r.error).collect::<Vec<_>>(),
            "AbsError" => self.records.iter().map(|r| r.abs_error).collect::<Vec<_>>(),
            "PercentError" => self.records.iter().map(|r| r.percent_error).collect::<Vec<_>>(),
            "AbsPercentError" => self.records.iter().map(|r| r.abs_percent_error).collect::<Vec<_>>(),
        ]?;
        write_csv(&mut full, &dir.join(FULL_RESULTS_FILE))?;

        info!("Evaluation report saved to {}", dir.join(REPORT_FILE).display());
        Ok(())
    }
}

/// Write `validation_predictions.csv` and `validation_actual.csv` into `dir`.
pub fn write_validation_files(set: &ValidationSet, dir: &Path) -> Result<()> {
    let mut predictions = df![
        ID_COLUMN => set.ids.clone(),
        PRICE_COLUMN => set.predicted.clone(),
    ]?;
    let mut actual = df![
        ID_COLUMN => set.ids.clone(),
        PRICE_COLUMN => set.actual.clone(),
    ]?;
    write_csv(&mut predictions, &dir.join(PREDICTIONS_FILE))?;
    write_csv(&mut actual, &dir.join(ACTUAL_FILE))?;
    Ok(())
}

fn id_price_pairs(df: &DataFrame) -> Result<Vec<(i64, f64)>> {
    let column = |name: &str| -> Result<Vec<Option<f64>>> {
        numeric_values(df, name)?
            .ok_or_else(|| LearningError::InvalidData(format!("missing '{name}' column")))
    };
    Ok(column(ID_COLUMN)?
        .into_iter()
        .zip(column(PRICE_COLUMN)?)
        .filter_map(|(id, price)| Some((id? as i64, price?)))
        .collect())
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

fn prediction_table(out: &mut String, records: &[EvaluationRecord]) {
    let _ = writeln!(
        out,
        "{:>8} {:>12} {:>12} {:>10}",
        "Id", "Actual", "Predicted", "AbsPct%"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:>8} {:>12.0} {:>12.0} {:>10.2}",
            r.id, r.actual, r.predicted, r.abs_percent_error
        );
    }
}

/// `(min, max, mean)` of a non-empty sequence.
fn range(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let (min, max, sum, n) = values.fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize),
        |(lo, hi, s, n), v| (lo.min(v), hi.max(v), s + v, n + 1),
    );
    (min, max, if n == 0 { 0.0 } else { sum / n as f64 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report() -> EvaluationReport {
        EvaluationReport::evaluate(
            &[1, 2, 3, 4],
            &[100_000.0, 200_000.0, 250_000.0, 400_000.0],
            &[104_000.0, 181_000.0, 250_000.0, 450_000.0],
        )
        .unwrap()
    }

    #[test]
    fn test_record_errors() {
        let record = EvaluationRecord::new(1, 200_000.0, 180_000.0);
        assert_eq!(record.error, -20_000.0);
        assert_eq!(record.abs_error, 20_000.0);
        assert!((record.percent_error + 10.0).abs() < 1e-9);
        assert!((record.abs_percent_error - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_and_bands() {
        let report = report();
        // Errors: 4000, -19000, 0, 50000
        assert_eq!(report.metrics.mean_error, 8_750.0);
        assert_eq!(report.metrics.max_abs_error, 50_000.0);
        assert_eq!(report.metrics.min_abs_error, 0.0);
        assert!((report.metrics.mae - 18_250.0).abs() < 1e-6);

        // Percent errors: 4, 9.5, 0, 12.5
        assert_eq!(
            report.accuracy,
            AccuracyBands {
                within_5: 2,
                within_10: 3,
                within_15: 4,
                total: 4
            }
        );
    }

    #[test]
    fn test_price_ranges_are_right_closed() {
        let report = report();
        let counts: Vec<usize> = report.price_ranges.iter().map(|b| b.count).collect();
        // 100000 falls in the first range, 200000 and 250000 close theirs.
        assert_eq!(counts, vec![1, 0, 1, 1, 0, 1]);
        assert_eq!(report.price_ranges[1].mape, None);
        assert!((report.price_ranges[0].mape.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_worst_and_best_ordering() {
        let report = report();
        let worst: Vec<i64> = report.worst.iter().map(|r| r.id).collect();
        assert_eq!(worst, vec![4, 2, 1, 3]);
        assert_eq!(report.best[0].id, 3);
    }

    #[test]
    fn test_render_sections() {
        let text = report().render();
        for heading in [
            "OVERALL PERFORMANCE METRICS",
            "PREDICTION ACCURACY",
            "TOP 10 WORST PREDICTIONS",
            "PRICE RANGE ANALYSIS",
            "overestimates",
        ] {
            assert!(text.contains(heading), "missing {heading}");
        }
    }

    #[test]
    fn test_round_trip_through_validation_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = ValidationSet {
            ids: vec![10, 11, 12],
            actual: vec![150_000.0, 175_000.0, 210_000.0],
            predicted: vec![155_000.0, 170_000.0, 200_000.0],
        };
        write_validation_files(&set, dir.path()).unwrap();

        let report = EvaluationReport::from_dir(dir.path()).unwrap();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[2].id, 12);
        assert_eq!(report.records[2].predicted, 200_000.0);

        report.write(dir.path()).unwrap();
        assert!(dir.path().join(REPORT_FILE).is_file());
        assert!(dir.path().join(FULL_RESULTS_FILE).is_file());
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EvaluationReport::from_dir(dir.path()).is_err());
    }
}
