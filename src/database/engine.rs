//! Query engine abstraction
//!
//! The registrar only needs to submit a statement and read back the rows of
//! existence checks, so that is all [`QueryEngine`] asks for.

use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{LazyLock, Mutex, PoisonError};

/// Rows returned by a statement, one `Vec` of cell texts per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// Create a result from rows
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Result without rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Consume the result and return every row
    pub fn fetch_all(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Borrow the rows
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Check if no rows were returned
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes SQL text against a catalog
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Execute one statement and return its rows
    ///
    /// A statement the engine rejects is reported as
    /// [`Error::RemoteExecution`].
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}

// ============================================================================
// Dry Run Engine
// ============================================================================

/// Engine that logs statements and reports every table as absent
#[derive(Debug, Default)]
pub struct DryRunEngine;

impl DryRunEngine {
    /// Create a dry run engine
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryEngine for DryRunEngine {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        tracing::info!("[dry-run] {sql}");
        Ok(QueryResult::empty())
    }
}

// ============================================================================
// Memory Catalog
// ============================================================================

static CREATE_DATABASE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+DATABASE\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w.]+)").unwrap()
});

static CREATE_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*CREATE\s+(?:EXTERNAL\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)\.(\w+)")
        .unwrap()
});

static SHOW_TABLES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*SHOW\s+TABLES\s+IN\s+(\w+)\s+'([^']*)'").unwrap());

static ALTER_TABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*ALTER\s+TABLE\s+(\w+)\.(\w+)\s").unwrap());

static LOCATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)LOCATION\s+'([^']*)'").unwrap());

#[derive(Debug, Default)]
struct CatalogState {
    databases: BTreeSet<String>,
    /// (database, table) to location
    tables: BTreeMap<(String, String), Option<String>>,
    statements: Vec<String>,
    rejections: Vec<(String, String)>,
}

/// In-process catalog that understands the statements the registrar issues
///
/// Tracks databases, tables and their locations, answers `SHOW TABLES`, and
/// records every statement in order. Statements containing a configured
/// fragment can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject statements containing `fragment` with `message`
    #[must_use]
    pub fn reject_containing(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock()
            .rejections
            .push((fragment.into(), message.into()));
        self
    }

    /// Register an existing table
    #[must_use]
    pub fn with_table(self, database: &str, table: &str, location: Option<&str>) -> Self {
        {
            let mut state = self.lock();
            state.databases.insert(database.to_string());
            state.tables.insert(
                (database.to_string(), table.to_string()),
                location.map(str::to_string),
            );
        }
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Check if a database exists
    pub fn has_database(&self, database: &str) -> bool {
        self.lock().databases.contains(database)
    }

    /// Check if a table exists
    pub fn has_table(&self, database: &str, table: &str) -> bool {
        self.lock()
            .tables
            .contains_key(&(database.to_string(), table.to_string()))
    }

    /// Current location of a table
    pub fn table_location(&self, database: &str, table: &str) -> Option<String> {
        self.lock()
            .tables
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .flatten()
    }
}

#[async_trait]
impl QueryEngine for MemoryCatalog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());

        if let Some((_, message)) = state
            .rejections
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(Error::remote(sql, message.clone()));
        }

        if let Some(caps) = CREATE_DATABASE_REGEX.captures(sql) {
            state.databases.insert(caps[1].to_string());
            return Ok(QueryResult::empty());
        }

        if let Some(caps) = CREATE_TABLE_REGEX.captures(sql) {
            let database = caps[1].to_string();
            if !state.databases.contains(&database) {
                return Err(Error::remote(sql, format!("Database {database} not found")));
            }
            let location = LOCATION_REGEX.captures(sql).map(|c| c[1].to_string());
            state
                .tables
                .entry((database, caps[2].to_string()))
                .or_insert(location);
            return Ok(QueryResult::empty());
        }

        if let Some(caps) = SHOW_TABLES_REGEX.captures(sql) {
            let key = (caps[1].to_string(), caps[2].to_string());
            let rows = if state.tables.contains_key(&key) {
                vec![vec![key.1]]
            } else {
                Vec::new()
            };
            return Ok(QueryResult::new(rows));
        }

        if let Some(caps) = ALTER_TABLE_REGEX.captures(sql) {
            let key = (caps[1].to_string(), caps[2].to_string());
            let location = LOCATION_REGEX.captures(sql).map(|c| c[1].to_string());
            let Some(current) = state.tables.get_mut(&key) else {
                return Err(Error::remote(
                    sql,
                    format!("Table {}.{} not found", key.0, key.1),
                ));
            };
            if location.is_some() {
                *current = location;
            }
            return Ok(QueryResult::empty());
        }

        Ok(QueryResult::empty())
    }
}
