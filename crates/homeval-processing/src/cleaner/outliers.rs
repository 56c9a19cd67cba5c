//! Target outlier handling.
//!
//! Rows are removed when the target falls outside an interquartile fence.

use crate::utils::sorted_quantile;
use serde::{Deserialize, Serialize};

/// Inclusive fence `[max(0, Q1 - k*IQR), Q3 + k*IQR]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Compute the fence from the given values. Non-finite values are ignored.
    ///
    /// Returns `None` when no valid value remains.
    pub fn from_values(values: &[f64], multiplier: f64) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = sorted_quantile(&sorted, 0.25)?;
        let q3 = sorted_quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;

        Some(Self {
            q1,
            q3,
            iqr,
            lower: (q1 - multiplier * iqr).max(0.0),
            upper: q3 + multiplier * iqr,
        })
    }

    /// Whether a value lies inside the fence. Bounds are inclusive.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Outcome of a target outlier pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierReport {
    pub fence: Option<IqrFence>,
    pub rows_before: usize,
    pub rows_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_quartiles_interpolate() {
        let fence = IqrFence::from_values(&[10.0, 20.0, 30.0, 40.0, 50.0], 2.0).unwrap();
        assert_eq!(fence.q1, 20.0);
        assert_eq!(fence.q3, 40.0);
        assert_eq!(fence.iqr, 20.0);
        assert_eq!(fence.upper, 80.0);
        assert_eq!(fence.lower, 0.0);
    }

    #[test]
    fn test_fence_lower_bound_not_floored_when_positive() {
        let fence = IqrFence::from_values(&[100.0, 110.0, 120.0, 130.0, 140.0], 1.0).unwrap();
        assert_eq!(fence.lower, 90.0);
        assert_eq!(fence.upper, 150.0);
    }

    #[test]
    fn test_fence_bounds_are_inclusive() {
        let fence = IqrFence::from_values(&[10.0, 20.0, 30.0, 40.0, 50.0], 2.0).unwrap();
        assert!(fence.contains(80.0));
        assert!(!fence.contains(80.5));
        assert!(fence.contains(0.0));
    }

    #[test]
    fn test_fence_empty_input() {
        assert!(IqrFence::from_values(&[], 2.0).is_none());
        assert!(IqrFence::from_values(&[f64::NAN], 2.0).is_none());
    }
}
