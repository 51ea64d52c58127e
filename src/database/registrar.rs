//! Table registration
//!
//! Creates the database and keeps one external table per stream pointed at
//! the stream's data location.

use super::engine::{QueryEngine, QueryResult};
use crate::config::CallPolicy;
use crate::error::Result;
use crate::schema::{render_create_database, render_create_table, TableDescriptor};
use std::sync::Arc;
use tracing::{debug, info, Instrument, Span};

/// Outcome of [`TableRegistrar::ensure_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// The table did not exist and was created
    Created,
    /// The table existed; columns, location and properties were replaced
    Refreshed,
}

/// `SHOW TABLES IN {database} '{table}';`
pub fn render_show_tables(database: &str, table: &str) -> String {
    format!("SHOW TABLES IN {database} '{table}';")
}

/// The statements that bring an existing table in line with `table`
///
/// Replace columns, set location, set the header skip property. The row
/// format of an existing table is left alone.
pub fn render_alter_table(table: &TableDescriptor) -> Vec<String> {
    let prefix = format!("ALTER TABLE {} ", table.qualified_name());
    let columns = table
        .columns
        .iter()
        .map(crate::schema::ColumnDefinition::render_inline)
        .collect::<Vec<_>>()
        .join(", ");

    let mut statements = vec![format!("{prefix}REPLACE COLUMNS ({columns})")];
    if let Some(location) = &table.location {
        statements.push(format!("{prefix}SET LOCATION '{location}'"));
    }
    statements.push(format!(
        "{prefix}SET TBLPROPERTIES ('skip.header.line.count'='{}')",
        table.skip_header_lines
    ));
    statements
}

/// Issues database and table DDL against a query engine
///
/// Statements are submitted one at a time under the DDL deadline of the
/// call policy. A failed statement is returned as is; earlier statements
/// of the same call are not undone.
#[derive(Clone)]
pub struct TableRegistrar {
    engine: Arc<dyn QueryEngine>,
    policy: CallPolicy,
    span: Span,
}

impl std::fmt::Debug for TableRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistrar")
            .field("engine", &self.engine.name())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TableRegistrar {
    /// Create a registrar without deadlines
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        let span = tracing::info_span!("registrar", engine = engine.name());
        Self {
            engine,
            policy: CallPolicy::unbounded(),
            span,
        }
    }

    /// Set the deadline policy
    #[must_use]
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Log under `span` instead of the registrar's own span
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Query engine in use
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    async fn run(&self, sql: &str) -> Result<QueryResult> {
        debug!("Executing:\n{sql}");
        self.policy.ddl(self.engine.execute(sql)).await
    }

    /// `CREATE DATABASE IF NOT EXISTS`
    pub async fn ensure_database(&self, database: &str) -> Result<()> {
        async {
            self.run(&render_create_database(database)).await?;
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Check if `table` exists in `database`
    pub async fn table_exists(&self, database: &str, table: &str) -> Result<bool> {
        let rows = self
            .run(&render_show_tables(database, table))
            .instrument(self.span.clone())
            .await?
            .fetch_all();
        Ok(rows
            .iter()
            .any(|row| row.first().is_some_and(|name| name.eq_ignore_ascii_case(table))))
    }

    /// Create the table, or replace columns, location and header property of
    /// the existing one
    pub async fn ensure_table(&self, table: &TableDescriptor) -> Result<TableState> {
        async {
            if self.table_exists(&table.database, &table.table).await? {
                for statement in render_alter_table(table) {
                    self.run(&statement).await?;
                }
                info!("Refreshed table {}", table.qualified_name());
                Ok(TableState::Refreshed)
            } else {
                self.run(&render_create_table(table)).await?;
                info!("Created table {}", table.qualified_name());
                Ok(TableState::Created)
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
