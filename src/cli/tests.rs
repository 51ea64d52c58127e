//! CLI tests

use super::*;
use crate::config::TargetConfig;
use crate::types::ObjectFormat;
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::json;

fn config() -> TargetConfig {
    let mut config = TargetConfig::new("lake", "analytics");
    config.table_prefix = Some(String::new());
    config
}

fn users_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "address": {"type": "object", "properties": {"city": {"type": "string"}}}
        }
    })
}

#[test]
fn test_run_is_the_default_command() {
    let cli = Cli::parse_from(["target-athena", "--config", "config.json"]);
    assert!(cli.command.is_none());
    assert_eq!(cli.config.unwrap().to_str(), Some("config.json"));
}

#[test]
fn test_parse_ddl_command() {
    let cli = Cli::parse_from([
        "target-athena",
        "ddl",
        "--schema",
        "users.json",
        "--table",
        "users",
        "--format",
        "jsonl",
    ]);
    match cli.command {
        Some(Commands::Ddl {
            stream,
            format,
            flatten,
            ..
        }) => {
            assert_eq!(stream, "users");
            assert_eq!(format, Some(ObjectFormat::Jsonl));
            assert!(!flatten);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_render_csv_ddl() {
    let ddl = render_ddl(Some(config()), "users", &users_schema(), &DdlOptions::default()).unwrap();
    assert_eq!(
        ddl,
        "CREATE DATABASE IF NOT EXISTS analytics;\n\n\
         CREATE EXTERNAL TABLE IF NOT EXISTS analytics.users (\n  \
         `id` STRING,\n  \
         `address` STRING\n)\n\
         ROW FORMAT SERDE 'org.apache.hadoop.hive.serde2.OpenCSVSerde'\n\
         WITH SERDEPROPERTIES ('case.insensitive'='true')\n\
         STORED AS TEXTFILE\n\
         LOCATION 's3://lake/analytics/users/'\n\
         TBLPROPERTIES (\"skip.header.line.count\" = \"1\");"
    );
}

#[test]
fn test_render_nested_jsonl_ddl_from_schema_message() {
    let message = json!({"type": "SCHEMA", "stream": "users", "schema": users_schema()});
    let options = DdlOptions {
        database: Some("lake_db".to_string()),
        format: Some(ObjectFormat::Jsonl),
        ..DdlOptions::default()
    };

    let ddl = render_ddl(Some(config()), "users", &message, &options).unwrap();

    assert!(ddl.starts_with("CREATE DATABASE IF NOT EXISTS lake_db;"));
    assert!(ddl.contains("`address` STRUCT<\n    `city`: STRING\n  >"));
    assert!(ddl.contains("LOCATION 's3://lake/lake_db/users/'"));
    assert!(!ddl.contains("TBLPROPERTIES"));
}

#[test]
fn test_render_flattened_ddl_without_config() {
    let options = DdlOptions {
        flatten: true,
        location: Some("s3://elsewhere/users/".to_string()),
        ..DdlOptions::default()
    };

    let ddl = render_ddl(None, "users", &users_schema(), &options).unwrap();

    assert!(ddl.starts_with("CREATE DATABASE IF NOT EXISTS default;"));
    assert!(ddl.contains("  `address__city` STRING,\n  `id` STRING\n)"));
    assert!(ddl.contains("LOCATION 's3://elsewhere/users/'"));
}
