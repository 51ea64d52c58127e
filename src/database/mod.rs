//! Query engine support
//!
//! Registers batch locations as Athena external tables. The engine itself
//! sits behind [`QueryEngine`] so the registrar can run against Athena, an
//! in-memory catalog, or a dry run that only logs.

mod athena;
mod engine;
mod registrar;

pub use athena::AthenaClient;
pub use engine::{DryRunEngine, MemoryCatalog, QueryEngine, QueryResult};
pub use registrar::{render_alter_table, render_show_tables, TableRegistrar, TableState};

#[cfg(test)]
mod tests;
