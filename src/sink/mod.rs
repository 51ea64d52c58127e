//! Batch sink
//!
//! Orchestrates one batch of one stream: buffer the records locally,
//! register the table, then compress, upload and clean up.
//!
//! Table registration always precedes the upload, so a table never points
//! at a location before the batch could be visible there.

mod batch;
mod types;

pub use batch::{
    batch_header, csv_dialect, describe_table, preferred_header, serde_properties, table_columns,
    BatchSink,
};
pub use types::{BatchReport, CleanupReport};
