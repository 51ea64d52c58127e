//! Common types used throughout the Athena target
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type (insertion ordered)
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Object Format
// ============================================================================

/// SerDe used by Athena to read CSV objects
pub const CSV_SERDE: &str = "org.apache.hadoop.hive.serde2.OpenCSVSerde";

/// SerDe used by Athena to read newline-delimited JSON objects
pub const JSON_SERDE: &str = "org.openx.data.jsonserde.JsonSerDe";

/// File format of the buffered batch and the uploaded object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFormat {
    /// Comma (or custom delimiter) separated values with a header row
    #[default]
    Csv,
    /// One JSON document per line
    Jsonl,
}

impl ObjectFormat {
    /// File extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            ObjectFormat::Csv => "csv",
            ObjectFormat::Jsonl => "jsonl",
        }
    }

    /// Row format SerDe class for the external table
    pub fn serde(self) -> &'static str {
        match self {
            ObjectFormat::Csv => CSV_SERDE,
            ObjectFormat::Jsonl => JSON_SERDE,
        }
    }

    /// Whether objects of this format start with a header line
    pub fn has_header(self) -> bool {
        matches!(self, ObjectFormat::Csv)
    }
}

impl std::fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

// ============================================================================
// Compression
// ============================================================================

/// Compression applied to a finished batch file before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Upload the buffer file as-is
    #[default]
    None,
    /// Upload a gzip-compressed sibling with a `.gz` suffix
    Gzip,
}

impl Compression {
    /// Resolve a configured compression value.
    ///
    /// Absent and `none` (any case) mean no compression, `gzip` enables gzip.
    /// Anything else is rejected.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(Compression::None),
            Some(v) if v.eq_ignore_ascii_case("none") => Ok(Compression::None),
            Some("gzip") => Ok(Compression::Gzip),
            Some(other) => Err(Error::UnsupportedCompression {
                value: other.to_string(),
            }),
        }
    }

    /// Suffix appended to file names and destination keys
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
        }
    }
}
