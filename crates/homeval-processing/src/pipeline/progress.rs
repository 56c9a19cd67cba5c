//! Progress reporting for the preparation pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use homeval_processing::PreparationPipeline;
//!
//! let prepared = PreparationPipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .fit_transform(df)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the preparation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreparationStage {
    /// Filling nulls and removing target outliers
    Cleaning,
    /// Deriving engineered columns
    FeatureEngineering,
    /// Ordinal and one-hot encoding
    Encoding,
    /// Projecting onto the feature schema
    Alignment,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PreparationStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cleaning => "Cleaning Data",
            Self::FeatureEngineering => "Engineering Features",
            Self::Encoding => "Encoding Categories",
            Self::Alignment => "Aligning Schema",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Cleaning => 0.0,
            Self::FeatureEngineering => 0.35,
            Self::Encoding => 0.65,
            Self::Alignment => 0.85,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A progress update emitted between stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: PreparationStage,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    /// Human-readable message
    pub message: String,
}

impl ProgressUpdate {
    /// Creates an update at the start of a stage.
    pub fn new(stage: PreparationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress(),
            message: message.into(),
        }
    }

    /// Creates a completion update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PreparationStage::Complete, message)
    }

    /// Creates a failure update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PreparationStage::Failed, message)
    }
}

/// Trait for receiving progress updates during preparation.
pub trait ProgressReporter: Send + Sync {
    /// Called at each stage boundary.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PreparationStage::Encoding, "Encoding...");
        assert_eq!(update.stage, PreparationStage::Encoding);
        assert_eq!(update.progress, 0.65);
        assert_eq!(update.message, "Encoding...");
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done");
        assert_eq!(update.stage, PreparationStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PreparationStage::Cleaning, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&PreparationStage::FeatureEngineering).unwrap();
        assert_eq!(json, "\"feature_engineering\"");
    }

    #[test]
    fn test_stages_are_monotonic() {
        let stages = [
            PreparationStage::Cleaning,
            PreparationStage::FeatureEngineering,
            PreparationStage::Encoding,
            PreparationStage::Alignment,
            PreparationStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].base_progress() < pair[1].base_progress());
        }
        assert_eq!(PreparationStage::Alignment.display_name(), "Aligning Schema");
    }
}
