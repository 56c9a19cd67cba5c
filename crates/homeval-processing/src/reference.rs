//! Reference tables frozen at training time and reused for every prediction.

use crate::cleaner::ImputationDefaults;
use crate::config::{DEFAULT_ID_COLUMN, DEFAULT_TARGET_COLUMN};
use crate::encoding::CategoryOrderTable;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::features::{FEATURE_SET_VERSION, NeighborhoodStats};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything the preparation steps need besides the input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTables {
    pub feature_set_version: u32,
    pub target_column: String,
    pub id_column: String,
    pub imputation: ImputationDefaults,
    pub neighborhoods: NeighborhoodStats,
    pub category_orders: CategoryOrderTable,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self {
            feature_set_version: FEATURE_SET_VERSION,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            imputation: ImputationDefaults::default(),
            neighborhoods: NeighborhoodStats::default(),
            category_orders: CategoryOrderTable::ames(),
        }
    }
}

impl ReferenceTables {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(ProcessingError::from)
            .context(format!("Failed to write reference tables to {}", path.display()))
    }

    /// Load tables and reject those written for another feature set.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(ProcessingError::from)
            .context(format!("Failed to read reference tables from {}", path.display()))?;
        let tables: ReferenceTables = serde_json::from_str(&json)?;

        if tables.feature_set_version != FEATURE_SET_VERSION {
            return Err(ProcessingError::InvalidConfig(format!(
                "reference tables use feature set v{}, this build computes v{}",
                tables.feature_set_version, FEATURE_SET_VERSION
            )));
        }
        Ok(tables)
    }
}
