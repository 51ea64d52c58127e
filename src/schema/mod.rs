//! Schema compilation module
//!
//! Parses a stream's JSON Schema into a [`SchemaNode`] tree and compiles it
//! into Hive DDL for Athena.
//!
//! # Features
//!
//! - **Lenient parsing**: unknown shapes fall back to a `string` leaf
//! - **Column compilation**: objects become `STRUCT<...>`, arrays `ARRAY<...>`
//! - **Statement rendering**: `CREATE DATABASE` and `CREATE EXTERNAL TABLE`

mod compiler;
mod types;

pub use compiler::{
    compile_columns, compile_fields, derive_columns, header_columns, render_columns,
    render_create_database, render_create_table, ColumnDefinition, TableDescriptor, STRING_TYPE,
};
pub use types::{SchemaField, SchemaNode};
