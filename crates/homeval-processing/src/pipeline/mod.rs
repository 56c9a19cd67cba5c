//! Pipeline module.
//!
//! This module provides the preparation pipeline and its progress reporting.

mod builder;
pub mod progress;

pub use builder::{PreparationPipeline, PreparationPipelineBuilder, PreparedData};
pub use progress::{ClosureProgressReporter, PreparationStage, ProgressReporter, ProgressUpdate};
