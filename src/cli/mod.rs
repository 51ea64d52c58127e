//! CLI module
//!
//! Command-line interface of the target.
//!
//! # Commands
//!
//! - `run` - Read tap messages from stdin and load them (default)
//! - `ddl` - Print the DDL a stream schema compiles to
//! - `validate` - Check the configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::{render_ddl, DdlOptions, Runner};

#[cfg(test)]
mod tests;
