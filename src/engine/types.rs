//! Engine types
//!
//! Input messages of the target and run statistics.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// A message read from the upstream tap, one JSON document per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Declares (or replaces) the schema of a stream
    Schema {
        /// Stream name
        stream: String,
        /// JSON Schema of the stream's records
        schema: JsonValue,
        /// Primary key columns
        #[serde(default)]
        key_properties: Vec<String>,
    },
    /// One record of a stream
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: JsonObject,
    },
    /// Opaque tap state, echoed once every buffered record is written
    State {
        /// State payload
        value: JsonValue,
    },
    /// Table version switch (accepted and ignored)
    ActivateVersion {
        /// Stream name
        stream: String,
        /// Version number
        #[serde(default)]
        version: Option<i64>,
    },
}

impl Message {
    /// Parse one input line; `line` is 1-based and only used for errors
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Message {
            line,
            message: e.to_string(),
        })
    }

    /// Create a schema message
    pub fn schema(stream: impl Into<String>, schema: JsonValue) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties: Vec::new(),
        }
    }

    /// Create a record message
    pub fn record(stream: impl Into<String>, record: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(value: JsonValue) -> Self {
        Self::State { value }
    }

    /// Stream the message belongs to, if any
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. }
            | Self::Record { stream, .. }
            | Self::ActivateVersion { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }
}

/// Statistics from a target run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetStats {
    /// Messages read
    pub messages: usize,
    /// Records received
    pub records: usize,
    /// Batches written
    pub batches: usize,
    /// Rows written across all batches
    pub rows_written: usize,
    /// Streams with a schema
    pub streams: usize,
    /// State messages emitted
    pub states_emitted: usize,
}

impl TargetStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a written batch
    pub fn add_batch(&mut self, rows: usize) {
        self.batches += 1;
        self.rows_written += rows;
    }
}
