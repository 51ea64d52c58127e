//! Integration tests against real S3 and Athena
//!
//! These tests need AWS credentials in the environment.
//! Set ATHENA_TEST_BUCKET (and optionally ATHENA_TEST_DATABASE) to run.

use serde_json::json;
use std::sync::Arc;
use target_athena::database::{AthenaClient, QueryEngine, TableRegistrar, TableState};
use target_athena::engine::Target;
use target_athena::{ObjectFormat, TargetConfig};

/// Get test config from environment or skip
fn get_test_config() -> Option<TargetConfig> {
    let bucket = std::env::var("ATHENA_TEST_BUCKET").ok()?;
    let database = std::env::var("ATHENA_TEST_DATABASE")
        .unwrap_or_else(|_| "target_athena_test".to_string());

    let mut config = TargetConfig::new(bucket, database);
    config.s3_key_prefix = "target-athena-it/".to_string();
    config.table_prefix = Some("it".to_string());
    config.ddl_timeout_secs = Some(120);
    config.upload_timeout_secs = Some(60);
    Some(config)
}

#[tokio::test]
async fn test_athena_show_tables() {
    let Some(config) = get_test_config() else {
        println!("Skipping: ATHENA_TEST_BUCKET not set");
        return;
    };

    let client = AthenaClient::from_config(&config).unwrap();
    let registrar = TableRegistrar::new(Arc::new(client)).with_policy(config.call_policy());
    registrar
        .ensure_database(&config.athena_database)
        .await
        .unwrap();

    let exists = registrar
        .table_exists(&config.athena_database, "it_does_not_exist")
        .await
        .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn test_athena_load_and_query() {
    let Some(mut config) = get_test_config() else {
        println!("Skipping: ATHENA_TEST_BUCKET not set");
        return;
    };
    config.object_format = ObjectFormat::Jsonl;

    let lines = [
        json!({"type": "SCHEMA", "stream": "people", "schema": {"type": "object", "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}}}),
        json!({"type": "RECORD", "stream": "people", "record": {"id": 1, "name": "Ann"}}),
        json!({"type": "STATE", "value": {"people": 1}}),
    ]
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("\n");

    let mut target = Target::new(config.clone());
    let mut output = Vec::new();
    let stats = target.run(lines.as_bytes(), &mut output).await.unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(String::from_utf8(output).unwrap(), "{\"people\":1}\n");

    let client = AthenaClient::from_config(&config).unwrap();
    let rows = client
        .execute(&format!(
            "SELECT count(*) FROM {}.it_people",
            config.athena_database
        ))
        .await
        .unwrap()
        .fetch_all();
    // Header row, then the count
    assert!(rows.len() >= 2, "{rows:?}");

    let registrar = TableRegistrar::new(Arc::new(client));
    let table = target_athena::sink::describe_table(
        &config,
        "people",
        &target_athena::schema::SchemaNode::from_json(&json!({"type": "object"})),
        &["id".to_string(), "name".to_string()],
    )
    .unwrap();
    assert_eq!(
        registrar.ensure_table(&table).await.unwrap(),
        TableState::Refreshed
    );
}
