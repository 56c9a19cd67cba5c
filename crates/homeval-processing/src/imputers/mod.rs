//! Imputation module for handling missing values.
//!
//! Median for numeric columns, mode for categorical columns.

mod statistical;

pub use statistical::StatisticalImputer;
