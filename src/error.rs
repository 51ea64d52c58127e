//! Error types for the Athena target
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the Athena target
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Compression type '{value}' is not supported. Expected: 'none' or 'gzip'")]
    UnsupportedCompression { value: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Invalid message at line {line}: {message}")]
    Message { line: usize, message: String },

    #[error("Schema error for stream '{stream}': {message}")]
    Schema { stream: String, message: String },

    #[error("Record received for stream '{stream}' before its schema")]
    SchemaNotFound { stream: String },

    // ============================================================================
    // Query Engine Errors
    // ============================================================================
    #[error("Statement rejected by query engine: {message}\n{statement}")]
    RemoteExecution { statement: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // ============================================================================
    // Object Storage Errors
    // ============================================================================
    #[error("Failed to upload '{key}': {message}")]
    Upload { key: String, message: String },

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    // ============================================================================
    // Serialization Errors
    // ============================================================================
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Deadline Errors
    // ============================================================================
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a remote execution error for a rejected statement
    pub fn remote(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteExecution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create an upload error
    pub fn upload(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Check if this error is retryable by an outer policy.
    ///
    /// The batch pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Upload { .. } | Error::Http(_) => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            Error::ObjectStore(e) => !matches!(
                e,
                object_store::Error::NotFound { .. }
                    | object_store::Error::NotSupported { .. }
                    | object_store::Error::InvalidPath { .. }
            ),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the Athena target
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("s3_bucket");
        assert_eq!(err.to_string(), "Missing required config field: s3_bucket");

        let err = Error::UnsupportedCompression {
            value: "zstd".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Compression type 'zstd' is not supported. Expected: 'none' or 'gzip'"
        );
    }

    #[test]
    fn test_remote_error_keeps_statement() {
        let err = Error::remote("CREATE DATABASE IF NOT EXISTS db;", "access denied");
        let text = err.to_string();
        assert!(text.contains("access denied"));
        assert!(text.contains("CREATE DATABASE IF NOT EXISTS db;"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::timeout("upload", 1000).is_retryable());
        assert!(Error::upload("a/b.csv", "connection reset").is_retryable());

        assert!(Error::http_status(503, "Service Unavailable").is_retryable());
        assert!(!Error::http_status(400, "Bad Request").is_retryable());

        assert!(!Error::config("test").is_retryable());
        assert!(!Error::remote("SELECT 1", "syntax error").is_retryable());
        assert!(!Error::UnsupportedCompression {
            value: "lz4".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
