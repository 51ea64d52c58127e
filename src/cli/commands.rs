//! CLI commands and argument parsing

use crate::types::ObjectFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Load Singer tap output into S3 and register it with Athena
#[derive(Parser, Debug)]
#[command(name = "target-athena")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read tap messages and load them (the default)
    Run {
        /// Read messages from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the DDL a stream schema compiles to
    Ddl {
        /// JSON Schema file, or a file holding a SCHEMA message
        #[arg(long)]
        schema: PathBuf,

        /// Stream the table is named after
        #[arg(long, visible_alias = "table")]
        stream: String,

        /// Database (overrides the config)
        #[arg(long)]
        database: Option<String>,

        /// Object format (overrides the config)
        #[arg(long, value_enum)]
        format: Option<ObjectFormat>,

        /// Flatten nested properties into columns
        #[arg(long)]
        flatten: bool,

        /// Table location, when no config is given
        #[arg(long)]
        location: Option<String>,
    },

    /// Validate the configuration
    Validate,
}
