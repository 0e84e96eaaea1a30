//! Caller-supplied tabular dataset, bound into the script namespace as `df`.

use crate::errors::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A rows-by-named-columns table, as parsed upstream from an uploaded
/// spreadsheet. The sandbox never interprets the cell values; it only hands
/// the table to the environment, where it becomes a dataframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, rejecting ragged rows and duplicate column names.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SandboxError::Internal(format!(
                    "duplicate column name '{column}' in dataset"
                )));
            }
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SandboxError::Internal(format!(
                    "dataset row {index} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Wire form written to the workspace for the bootstrap to load.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
