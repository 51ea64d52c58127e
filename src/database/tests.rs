//! Registrar and catalog tests

use super::*;
use crate::config::CallPolicy;
use crate::error::Error;
use crate::schema::{header_columns, render_create_table, TableDescriptor};
use crate::types::CSV_SERDE;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn events_table() -> TableDescriptor {
    TableDescriptor::new("analytics", "events", header_columns(&["id", "name"]))
        .with_location("s3://lake/analytics/events/")
        .with_serde(CSV_SERDE)
        .with_serde_properties("'case.insensitive'='true'")
        .with_skip_header(true)
}

// ============================================================================
// Statement Tests
// ============================================================================

#[test]
fn test_render_show_tables() {
    assert_eq!(
        render_show_tables("analytics", "events"),
        "SHOW TABLES IN analytics 'events';"
    );
}

#[test]
fn test_render_alter_table() {
    assert_eq!(
        render_alter_table(&events_table()),
        vec![
            "ALTER TABLE analytics.events REPLACE COLUMNS (`id` STRING, `name` STRING)",
            "ALTER TABLE analytics.events SET LOCATION 's3://lake/analytics/events/'",
            "ALTER TABLE analytics.events SET TBLPROPERTIES ('skip.header.line.count'='1')",
        ]
    );
}

// ============================================================================
// Memory Catalog Tests
// ============================================================================

#[tokio::test]
async fn test_catalog_tracks_tables() {
    let catalog = MemoryCatalog::new();

    catalog
        .execute("CREATE DATABASE IF NOT EXISTS analytics;")
        .await
        .unwrap();
    catalog
        .execute(&render_create_table(&events_table()))
        .await
        .unwrap();

    assert!(catalog.has_database("analytics"));
    assert!(catalog.has_table("analytics", "events"));
    assert_eq!(
        catalog.table_location("analytics", "events").as_deref(),
        Some("s3://lake/analytics/events/")
    );

    let rows = catalog
        .execute("SHOW TABLES IN analytics 'events';")
        .await
        .unwrap()
        .fetch_all();
    assert_eq!(rows, vec![vec!["events".to_string()]]);

    let rows = catalog
        .execute("SHOW TABLES IN analytics 'missing';")
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_catalog_requires_database() {
    let catalog = MemoryCatalog::new();
    let err = catalog
        .execute(&render_create_table(&events_table()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteExecution { .. }));
}

#[tokio::test]
async fn test_catalog_rejects_configured_statements() {
    let catalog = MemoryCatalog::new().reject_containing("CREATE DATABASE", "access denied");
    let err = catalog
        .execute("CREATE DATABASE IF NOT EXISTS analytics;")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("access denied"));
    assert!(!catalog.has_database("analytics"));
    assert_eq!(catalog.statements().len(), 1);
}

#[tokio::test]
async fn test_dry_run_reports_nothing() {
    let engine = DryRunEngine::new();
    let result = engine
        .execute("SHOW TABLES IN analytics 'events';")
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(engine.name(), "dry-run");
}

// ============================================================================
// Registrar Tests
// ============================================================================

#[tokio::test]
async fn test_ensure_database() {
    let catalog = Arc::new(MemoryCatalog::new());
    let registrar = TableRegistrar::new(catalog.clone());

    registrar.ensure_database("analytics").await.unwrap();

    assert_eq!(
        catalog.statements(),
        vec!["CREATE DATABASE IF NOT EXISTS analytics;"]
    );
}

#[tokio::test]
async fn test_ensure_table_creates_missing_table() {
    let catalog = Arc::new(MemoryCatalog::new());
    let registrar = TableRegistrar::new(catalog.clone());
    registrar.ensure_database("analytics").await.unwrap();

    let state = registrar.ensure_table(&events_table()).await.unwrap();

    assert_eq!(state, TableState::Created);
    assert!(catalog.has_table("analytics", "events"));

    let statements = catalog.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[1], "SHOW TABLES IN analytics 'events';");
    assert_eq!(statements[2], render_create_table(&events_table()));
}

#[tokio::test]
async fn test_ensure_table_refreshes_existing_table() {
    let catalog =
        Arc::new(MemoryCatalog::new().with_table("analytics", "events", Some("s3://old/")));
    let registrar = TableRegistrar::new(catalog.clone());

    let state = registrar.ensure_table(&events_table()).await.unwrap();

    assert_eq!(state, TableState::Refreshed);
    let statements = catalog.statements();
    assert_eq!(statements.len(), 4);
    assert_eq!(&statements[1..], render_alter_table(&events_table()).as_slice());
    assert_eq!(
        catalog.table_location("analytics", "events").as_deref(),
        Some("s3://lake/analytics/events/")
    );
}

#[tokio::test]
async fn test_ensure_table_is_idempotent() {
    let catalog = Arc::new(MemoryCatalog::new());
    let registrar = TableRegistrar::new(catalog.clone());
    registrar.ensure_database("analytics").await.unwrap();

    assert_eq!(
        registrar.ensure_table(&events_table()).await.unwrap(),
        TableState::Created
    );
    assert_eq!(
        registrar.ensure_table(&events_table()).await.unwrap(),
        TableState::Refreshed
    );
}

#[tokio::test]
async fn test_failed_statement_stops_refresh() {
    let catalog = Arc::new(
        MemoryCatalog::new()
            .with_table("analytics", "events", None)
            .reject_containing("SET LOCATION", "not allowed"),
    );
    let registrar = TableRegistrar::new(catalog.clone());

    let err = registrar.ensure_table(&events_table()).await.unwrap_err();

    assert!(matches!(err, Error::RemoteExecution { .. }));
    // SHOW TABLES, REPLACE COLUMNS, then the rejected SET LOCATION
    assert_eq!(catalog.statements().len(), 3);
}

struct SlowEngine;

#[async_trait]
impl QueryEngine for SlowEngine {
    fn name(&self) -> &str {
        "slow"
    }

    async fn execute(&self, _sql: &str) -> crate::error::Result<QueryResult> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(QueryResult::empty())
    }
}

#[tokio::test]
async fn test_ddl_deadline() {
    let registrar = TableRegistrar::new(Arc::new(SlowEngine)).with_policy(CallPolicy {
        ddl_timeout: Some(Duration::from_millis(10)),
        upload_timeout: None,
    });

    let err = registrar.ensure_database("analytics").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
}
