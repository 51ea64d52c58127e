//! Output module
//!
//! Handles the local buffer files of a batch and their delivery to object
//! storage.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Appending rows to CSV or newline-delimited JSON buffer files
//! - Gzip compression of finished files
//! - Uploading files to S3 (or a local / in-memory store)

mod cloud;
mod compress;
mod writer;

pub use cloud::{build_s3, CloudDestination};
pub use compress::{compress_file, compressed_path, gzip_file};
pub use writer::{append_csv, append_jsonl, csv_cell, BatchSerializer, CsvDialect};
