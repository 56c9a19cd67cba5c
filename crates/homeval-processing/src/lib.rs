//! House-Price Data Preparation Library
//!
//! Turns raw housing listings (Ames layout) into fixed-width numeric feature
//! vectors, identically at training and at inference time. Built with Rust
//! and Polars.
//!
//! # Overview
//!
//! - **Cleaning**: median / mode imputation from frozen defaults, target
//!   outlier removal with an inclusive IQR fence
//! - **Feature Engineering**: a versioned set of age, area, quality, binary,
//!   neighborhood, interaction, temporal and log features
//! - **Encoding**: ordinal ranks from a fixed category order table, then
//!   one-hot encoding of the remaining string columns
//! - **Schema Alignment**: projection of any encoded table onto the feature
//!   schema fixed at training
//! - **Analysis**: column statistics and target correlations of a raw table
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use homeval_processing::{PipelineConfig, PreparationPipeline, RawRecord, io};
//!
//! let df = io::load_csv("datasets/ames-train.csv".as_ref())?;
//!
//! let pipeline = PreparationPipeline::builder()
//!     .config(PipelineConfig::builder().iqr_multiplier(2.0).build()?)
//!     .build()?;
//!
//! // Training: fit the reference tables and fix the schema.
//! let prepared = pipeline.fit_transform(df)?;
//!
//! // Inference: one record, projected onto the same schema.
//! let record = RawRecord::new()
//!     .with("OverallQual", 7)
//!     .with("GrLivArea", 1710.0)
//!     .with("YearBuilt", 2003)
//!     .with("YrSold", 2008)
//!     .with("Neighborhood", "CollgCr");
//! let features = pipeline.transform(
//!     &record.to_dataframe()?,
//!     &prepared.reference,
//!     &prepared.schema,
//! )?;
//! assert_eq!(features.width(), prepared.schema.len());
//! ```

pub mod analysis;
pub mod cleaner;
pub mod config;
pub mod encoding;
pub mod error;
pub mod features;
pub mod imputers;
pub mod io;
pub mod pipeline;
pub mod reference;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analysis::{ColumnAnalysis, CorrelationStrength, DatasetAnalysis};
pub use cleaner::{Cleaner, CleaningReport, ImputationDefaults, IqrFence, OutlierReport};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use encoding::{CategoryOrderTable, Encoder, EncodingReport};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use features::{
    ENGINEERED_FEATURES, FEATURE_SET_VERSION, FeatureEngineer, NeighborhoodRow, NeighborhoodStats,
};
pub use imputers::StatisticalImputer;
pub use pipeline::{
    ClosureProgressReporter, PreparationPipeline, PreparationPipelineBuilder, PreparationStage,
    PreparedData, ProgressReporter, ProgressUpdate,
};
pub use reference::ReferenceTables;
pub use schema::{FeatureSchema, SchemaAligner};
pub use types::{PreparationSummary, RawRecord, RawValue};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype, safe_div};
