// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # target-athena
//!
//! A Singer target that loads tap output into S3 and registers it as
//! Athena external tables.
//!
//! ## Features
//!
//! - **Record Flattening**: Nested records become `parent__child` columns with bounded key length
//! - **Schema Compilation**: JSON Schema to Hive column types and `CREATE TABLE` DDL
//! - **CSV and JSONL Batches**: Buffered locally, optionally gzip-compressed
//! - **Table Registration**: Create-or-refresh of one external table per stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use target_athena::{engine::Target, TargetConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = TargetConfig::from_file("config.json")?;
//!     let mut target = Target::new(config);
//!
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     let stats = target.run(stdin, &mut std::io::stdout()).await?;
//!     eprintln!("{} records in {} batches", stats.records, stats.batches);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Target (message loop)                       │
//! │  SCHEMA → open sink    RECORD → buffer    STATE → emit on drain │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Flatten  │  Schema   │    Output     │ Database  │    Sink     │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ __ keys  │ STRUCT    │ CSV / JSONL   │ Athena    │ buffer      │
//! │ abbrev.  │ ARRAY     │ gzip          │ Registrar │ register    │
//! │          │ DDL       │ S3 upload     │ Dry run   │ upload      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the target
pub mod error;

/// Common types and type aliases
pub mod types;

/// Target configuration
pub mod config;

/// Object key and buffer file naming
pub mod template;

/// Record key flattening
pub mod flatten;

/// JSON Schema model and DDL compilation
pub mod schema;

/// Batch files, compression and object storage
pub mod output;

/// Query engines and table registration
pub mod database;

/// Per-stream batch pipeline
pub mod sink;

/// Message loop
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TargetConfig;
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
