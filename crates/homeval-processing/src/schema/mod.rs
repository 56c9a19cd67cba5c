//! The frozen feature schema and the aligner that projects tables onto it.

mod aligner;

pub use aligner::SchemaAligner;

use crate::error::{ProcessingError, Result, ResultExt};
use crate::io::load_csv;
use crate::utils::column_names;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ordered list of model input columns fixed at training time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema from column names. Duplicates are rejected.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = std::collections::HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ProcessingError::Alignment(format!(
                    "duplicate schema column '{column}'"
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Every column of a prepared table except the target and id, in order.
    pub fn from_prepared(df: &DataFrame, target: &str, id: &str) -> Result<Self> {
        Self::new(
            column_names(df)
                .into_iter()
                .filter(|c| c != target && c != id)
                .collect(),
        )
    }

    /// Regenerate the schema from a processed training CSV.
    pub fn from_processed_csv(path: &Path, target: &str, id: &str) -> Result<Self> {
        let df = load_csv(path)?;
        Self::from_prepared(&df, target, id)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(ProcessingError::from)
            .context(format!("Failed to write schema to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(ProcessingError::from)
            .context(format!("Failed to read schema from {}", path.display()))?;
        let schema: FeatureSchema = serde_json::from_str(&json)?;
        Self::new(schema.columns)
    }
}
