//! Main preparation pipeline module.
//!
//! This module provides the `PreparationPipeline` struct and builder that
//! chain Cleaner → Feature Engineer → Encoder → Schema Aligner.

use crate::cleaner::Cleaner;
use crate::config::PipelineConfig;
use crate::encoding::{CategoryOrderTable, Encoder};
use crate::error::{ProcessingError, Result, ResultExt};
use crate::features::{ENGINEERED_FEATURES, FEATURE_SET_VERSION, FeatureEngineer, NeighborhoodStats};
use crate::pipeline::progress::{
    ClosureProgressReporter, PreparationStage, ProgressReporter, ProgressUpdate,
};
use crate::reference::ReferenceTables;
use crate::schema::{FeatureSchema, SchemaAligner};
use crate::types::PreparationSummary;
use crate::utils::has_column;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Output of fitting the pipeline on a training table.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// `Id` (if present), the schema columns, then the target.
    pub data: DataFrame,
    pub schema: FeatureSchema,
    pub reference: ReferenceTables,
    pub summary: PreparationSummary,
}

/// The main preparation pipeline.
///
/// Use [`PreparationPipeline::builder()`] to create a new pipeline with custom
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use homeval_processing::{PipelineConfig, PreparationPipeline};
///
/// let pipeline = PreparationPipeline::builder()
///     .config(PipelineConfig::builder().iqr_multiplier(2.0).build()?)
///     .build()?;
///
/// let prepared = pipeline.fit_transform(train_df)?;
/// let features = pipeline.transform(&new_rows, &prepared.reference, &prepared.schema)?;
/// ```
pub struct PreparationPipeline {
    config: PipelineConfig,
    category_orders: CategoryOrderTable,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PreparationPipeline: Send);

impl PreparationPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PreparationPipelineBuilder {
        PreparationPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fit the reference tables on a training table and return it fully
    /// prepared, with the feature schema it defines.
    pub fn fit_transform(&self, df: DataFrame) -> Result<PreparedData> {
        match self.fit_internal(df) {
            Ok(prepared) => {
                self.report_progress(ProgressUpdate::complete("Preparation complete"));
                Ok(prepared)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Preparation error: {}", e);
                Err(e)
            }
        }
    }

    /// Imputation defaults and neighborhood aggregates cover every row that
    /// survives cleaning, including the rows a trainer later holds out for
    /// validation.
    fn fit_internal(&self, mut df: DataFrame) -> Result<PreparedData> {
        let start_time = Instant::now();
        let target = self.config.target_column.as_str();
        let id = self.config.id_column.as_str();

        let mut summary = PreparationSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        info!("Starting preparation pipeline...");
        if !has_column(&df, target) {
            return Err(ProcessingError::Schema(target.to_string()));
        }

        // Step 1: cleaning
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Cleaning,
            "Cleaning training data...",
        ));
        let cleaner = Cleaner::new(&self.config);

        summary.missing_target_rows = cleaner.drop_missing_target(&mut df)?;
        if summary.missing_target_rows > 0 {
            summary.add_step(format!(
                "Dropped {} rows without '{}'",
                summary.missing_target_rows, target
            ));
        }

        if self.config.remove_outliers {
            let report =
                Cleaner::remove_target_outliers(&mut df, target, self.config.iqr_multiplier)?;
            summary.outliers_removed = report.rows_removed;
            if let Some(fence) = report.fence {
                summary.add_step(format!(
                    "Removed {} rows with '{}' outside [{:.0}, {:.0}]",
                    report.rows_removed, target, fence.lower, fence.upper
                ));
            }
        }

        if df.height() == 0 {
            return Err(ProcessingError::NoValidValues(target.to_string()));
        }

        let imputation = cleaner.fit(&df)?;
        let cleaning = cleaner.apply(&mut df, &imputation)?;
        summary.imputed_cells = cleaning.imputed_cells;
        summary.steps.extend(cleaning.steps);

        // Step 2: feature engineering
        self.report_progress(ProgressUpdate::new(
            PreparationStage::FeatureEngineering,
            "Engineering features...",
        ));
        let neighborhoods = NeighborhoodStats::fit(&df, target)?;
        let engineered = FeatureEngineer::new(&neighborhoods)
            .transform(&df)
            .context("Feature engineering failed")?;
        summary.engineered_features = ENGINEERED_FEATURES.len();
        summary.add_step(format!(
            "Added {} engineered features (v{})",
            ENGINEERED_FEATURES.len(),
            FEATURE_SET_VERSION
        ));

        // Step 3: encoding
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Encoding,
            "Encoding categorical columns...",
        ));
        let (encoded, encoding) = Encoder::new(&self.category_orders).encode(&engineered)?;
        summary.add_step(format!(
            "Encoded {} ordinal columns, one-hot encoded {} columns into {} indicators",
            encoding.ordinal_columns.len(),
            encoding.one_hot_sources.len(),
            encoding.indicator_columns
        ));

        // Step 4: schema
        self.report_progress(ProgressUpdate::new(
            PreparationStage::Alignment,
            "Fixing feature schema...",
        ));
        let schema = FeatureSchema::from_prepared(&encoded, target, id)?;
        let aligned = SchemaAligner::align(&encoded, &schema)?;
        let data = self.attach_id_and_target(&encoded, aligned)?;
        summary.columns_after = schema.len();
        summary.rows_after = data.height();

        let reference = ReferenceTables {
            feature_set_version: FEATURE_SET_VERSION,
            target_column: target.to_string(),
            id_column: id.to_string(),
            imputation,
            neighborhoods,
            category_orders: self.category_orders.clone(),
        };

        info!(
            "Prepared {} rows x {} features in {:.2?}",
            summary.rows_after,
            summary.columns_after,
            start_time.elapsed()
        );
        Ok(PreparedData {
            data,
            schema,
            reference,
            summary,
        })
    }

    /// Prepare rows for a fitted model: the output has exactly the schema
    /// columns, in order, as `Float64`.
    ///
    /// Columns missing from `df` take the frozen training defaults.
    pub fn transform(
        &self,
        df: &DataFrame,
        reference: &ReferenceTables,
        schema: &FeatureSchema,
    ) -> Result<DataFrame> {
        Self::transform_with(df, reference, schema)
    }

    /// [`PreparationPipeline::transform`] without a pipeline instance; all
    /// state comes from the reference tables.
    pub fn transform_with(
        df: &DataFrame,
        reference: &ReferenceTables,
        schema: &FeatureSchema,
    ) -> Result<DataFrame> {
        let config = PipelineConfig {
            target_column: reference.target_column.clone(),
            id_column: reference.id_column.clone(),
            ..Default::default()
        };

        let mut cleaned = df.clone();
        Cleaner::new(&config)
            .with_fill_absent(true)
            .apply(&mut cleaned, &reference.imputation)?;

        let engineered = FeatureEngineer::new(&reference.neighborhoods).transform(&cleaned)?;
        let (encoded, _) = Encoder::new(&reference.category_orders).encode(&engineered)?;
        let aligned = SchemaAligner::align(&encoded, schema)?;

        debug!("Transformed {} rows onto {} features", aligned.height(), schema.len());
        Ok(aligned)
    }

    /// Put `Id` in front and the target at the end of the aligned features.
    fn attach_id_and_target(&self, encoded: &DataFrame, aligned: DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(aligned.width() + 2);
        if has_column(encoded, &self.config.id_column) {
            columns.push(encoded.column(&self.config.id_column)?.clone());
        }
        columns.extend(aligned.get_columns().iter().cloned());
        let target = encoded
            .column(&self.config.target_column)?
            .cast(&DataType::Float64)?;
        columns.push(target);
        Ok(DataFrame::new(columns)?)
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for [`PreparationPipeline`].
#[derive(Default)]
pub struct PreparationPipelineBuilder {
    config: Option<PipelineConfig>,
    category_orders: Option<CategoryOrderTable>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PreparationPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the ordinal category orders. Defaults to the Ames table.
    pub fn category_orders(mut self, orders: CategoryOrderTable) -> Self {
        self.category_orders = Some(orders);
        self
    }

    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a closure as the progress reporter.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter(Arc::new(ClosureProgressReporter::new(callback)))
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<PreparationPipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| ProcessingError::InvalidConfig(e.to_string()))?;

        Ok(PreparationPipeline {
            config,
            category_orders: self.category_orders.unwrap_or_default(),
            progress_reporter: self.progress_reporter,
        })
    }
}
