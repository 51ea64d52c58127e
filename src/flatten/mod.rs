//! Record flattening
//!
//! Collapses nested records into a single level of `parent__child` keys so
//! they fit a flat CSV header or a column list of STRING columns.
//!
//! # Overview
//!
//! - Fields are visited in lexicographic order of their name at every level,
//!   so the output order never depends on the input's map order.
//! - Lists are stored as their JSON text; other scalars pass through.
//! - Joined keys of 255 characters or more are shortened segment by segment
//!   (see [`abbreviate`]). The shortening is lossy: two long paths may end up
//!   with the same key.

mod inflect;

pub use inflect::{abbreviate, camelize};

use crate::schema::{SchemaField, SchemaNode};
use crate::types::{JsonObject, JsonValue};

/// Separator placed between path segments
pub const DEFAULT_SEPARATOR: &str = "__";

/// Joined keys of this many characters or more are abbreviated
pub const MAX_KEY_LENGTH: usize = 255;

/// Deterministic record flattener
#[derive(Debug, Clone)]
pub struct KeyFlattener {
    separator: String,
}

impl Default for KeyFlattener {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl KeyFlattener {
    /// Create a flattener with the default `__` separator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flattener with a custom separator
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Separator in use
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Flatten a record
    pub fn flatten(&self, record: &JsonObject) -> JsonObject {
        let mut flat = JsonObject::new();
        self.flatten_into(record, &mut Vec::new(), &mut flat);
        flat
    }

    /// Flatten a record nested below `parent`
    pub fn flatten_with_parent(&self, record: &JsonObject, parent: &[String]) -> JsonObject {
        let mut flat = JsonObject::new();
        self.flatten_into(record, &mut parent.to_vec(), &mut flat);
        flat
    }

    fn flatten_into(&self, record: &JsonObject, path: &mut Vec<String>, out: &mut JsonObject) {
        let mut keys: Vec<&String> = record.keys().collect();
        keys.sort();

        for key in keys {
            let value = &record[key.as_str()];
            match value {
                JsonValue::Object(nested) => {
                    path.push(key.clone());
                    self.flatten_into(nested, path, out);
                    path.pop();
                }
                JsonValue::Array(_) => {
                    out.insert(
                        self.flatten_key(key, path),
                        JsonValue::String(value.to_string()),
                    );
                }
                _ => {
                    out.insert(self.flatten_key(key, path), value.clone());
                }
            }
        }
    }

    /// Join `parent` and `key`, abbreviating segments while the result is too long
    pub fn flatten_key(&self, key: &str, parent: &[String]) -> String {
        let mut segments: Vec<String> = parent.to_vec();
        segments.push(key.to_string());

        let mut index = 0;
        while self.joined_len(&segments) >= MAX_KEY_LENGTH && index < segments.len() {
            segments[index] = abbreviate(&segments[index]);
            index += 1;
        }

        segments.join(&self.separator)
    }

    fn joined_len(&self, segments: &[String]) -> usize {
        let separators = segments.len().saturating_sub(1) * self.separator.chars().count();
        segments.iter().map(|s| s.chars().count()).sum::<usize>() + separators
    }

    /// Flattened column names a schema produces
    ///
    /// Uses the same ordering and key shortening as [`Self::flatten`], so a
    /// record conforming to the schema yields a subset of these keys.
    /// Objects without declared properties contribute no columns.
    pub fn schema_keys(&self, fields: &[SchemaField]) -> Vec<String> {
        let mut keys = Vec::new();
        self.schema_keys_into(fields, &mut Vec::new(), &mut keys);
        keys
    }

    fn schema_keys_into(&self, fields: &[SchemaField], path: &mut Vec<String>, out: &mut Vec<String>) {
        let mut sorted: Vec<&SchemaField> = fields.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        for field in sorted {
            match field.node.non_null() {
                SchemaNode::Object(children) => {
                    path.push(field.name.clone());
                    self.schema_keys_into(children, path, out);
                    path.pop();
                }
                _ => out.push(self.flatten_key(&field.name, path)),
            }
        }
    }
}

/// Flatten a record with the default separator
pub fn flatten_record(record: &JsonObject) -> JsonObject {
    KeyFlattener::default().flatten(record)
}
