//! Sink result types

use crate::database::TableState;
use std::path::PathBuf;

/// Local files removed after an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted (already logged)
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    /// Check if every file was removed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of one processed batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Stream name
    pub stream: String,
    /// Table the batch was registered under
    pub table: String,
    /// Rows written
    pub rows: usize,
    /// Destination key
    pub key: String,
    /// Full object URI
    pub uri: String,
    /// Columns of the uploaded file
    pub columns: Vec<String>,
    /// Whether the table was created or refreshed
    pub table_state: TableState,
    /// Local cleanup outcome
    pub cleanup: CleanupReport,
}
