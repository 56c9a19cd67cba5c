//! Progress reporting types for training.
//!
//! This module defines [`TrainingStage`], [`ProgressUpdate`], and the
//! [`ProgressCallback`] type alias.
//!
//! # Example
//!
//! ```
//! use homeval_learning::{ProgressUpdate, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//!         if let Some((done, total)) = update.candidates_completed {
//!             println!("  Candidates: {done}/{total}");
//!         }
//!     })
//!     .build()
//!     .expect("valid config");
//! ```

use std::fmt;
use std::sync::Arc;

/// The current stage of training.
///
/// Training progresses through these stages in order, skipping
/// [`GridSearch`](Self::GridSearch) when grid search is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Building the feature matrix and the validation split.
    #[default]
    Splitting,

    /// Cross-validating grid candidates.
    GridSearch,

    /// Fitting the final forest.
    Fitting,

    /// Scoring the validation partition.
    Evaluation,

    /// Training finished successfully. Terminal.
    Complete,

    /// Training failed. Terminal.
    Failed,
}

impl TrainingStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Splitting => "splitting",
            TrainingStage::GridSearch => "grid_search",
            TrainingStage::Fitting => "fitting",
            TrainingStage::Evaluation => "evaluation",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress update emitted during training.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    /// Current stage.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable description of the current step.
    pub message: String,

    /// Grid candidates evaluated so far, as `(completed, total)`.
    pub candidates_completed: Option<(u32, u32)>,
}

impl ProgressUpdate {
    pub fn new(stage: TrainingStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            candidates_completed: None,
        }
    }

    #[must_use]
    pub fn with_candidates(mut self, completed: u32, total: u32) -> Self {
        self.candidates_completed = Some((completed, total));
        self
    }
}

/// Callback invoked with each [`ProgressUpdate`]. Grid candidates run on
/// rayon's pool, so the callback must be thread-safe.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stage_as_str() {
        assert_eq!(TrainingStage::GridSearch.as_str(), "grid_search");
        assert_eq!(TrainingStage::Complete.to_string(), "complete");
    }

    #[test]
    fn test_training_stage_is_terminal() {
        assert!(!TrainingStage::Splitting.is_terminal());
        assert!(!TrainingStage::Fitting.is_terminal());
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(ProgressUpdate::new(TrainingStage::Fitting, 1.7, "x").progress, 1.0);
        let update = ProgressUpdate::new(TrainingStage::GridSearch, 0.3, "cv").with_candidates(2, 8);
        assert_eq!(update.candidates_completed, Some((2, 8)));
    }
}
