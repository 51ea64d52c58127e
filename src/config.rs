//! Target configuration
//!
//! Settings consumed by the batch pipeline, loaded from a JSON or YAML file.
//! AWS credentials not present in the file are picked up from the standard
//! `AWS_*` environment variables when the S3 client is built.

use crate::error::{Error, Result};
use crate::types::ObjectFormat;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of rows buffered per stream before a flush
pub const DEFAULT_BATCH_SIZE_ROWS: usize = 10_000;

// ============================================================================
// Target Config
// ============================================================================

/// Complete target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Bucket receiving the batch objects
    pub s3_bucket: String,

    /// Athena database (table namespace)
    pub athena_database: String,

    /// AWS region of the bucket
    #[serde(default)]
    pub aws_region: Option<String>,

    /// Static access key (falls back to `AWS_ACCESS_KEY_ID`)
    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    /// Static secret key (falls back to `AWS_SECRET_ACCESS_KEY`)
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    /// Session token for temporary credentials
    #[serde(default)]
    pub aws_session_token: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack, ...)
    #[serde(default)]
    pub aws_endpoint: Option<String>,

    /// Location for Athena query results (falls back to `S3_STAGING_DIR`)
    #[serde(default)]
    pub s3_staging_dir: Option<String>,

    /// Athena workgroup
    #[serde(default)]
    pub athena_workgroup: Option<String>,

    /// Key prefix prepended to every object key
    #[serde(default)]
    pub s3_key_prefix: String,

    /// Object key template, see [`crate::template::target_key`]
    #[serde(default)]
    pub naming_convention: Option<String>,

    /// Format of the buffered and uploaded files
    #[serde(default)]
    pub object_format: ObjectFormat,

    /// Compression applied before upload (`none` or `gzip`)
    #[serde(default = "default_compression")]
    pub compression: Option<String>,

    /// Server side encryption type (`aws:kms`, `AES256`)
    #[serde(default)]
    pub encryption_type: Option<String>,

    /// KMS key id used with `aws:kms` encryption
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Flatten nested records into `parent__child` columns
    #[serde(default)]
    pub flatten_records: bool,

    /// CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// CSV quote character
    #[serde(default = "default_quotechar")]
    pub quotechar: String,

    /// Directory holding the local buffer files
    #[serde(default)]
    pub temp_dir: Option<String>,

    /// Prefix for table names (falls back to `TAP_NAME`)
    #[serde(default)]
    pub table_prefix: Option<String>,

    /// Rows buffered per stream before a batch is flushed
    #[serde(default = "default_batch_size")]
    pub batch_size_rows: usize,

    /// Deadline for a single DDL statement
    #[serde(default)]
    pub ddl_timeout_secs: Option<u64>,

    /// Deadline for a single object upload
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,

    /// Log DDL statements instead of executing them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_compression() -> Option<String> {
    Some("gzip".to_string())
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_quotechar() -> String {
    "\"".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE_ROWS
}

impl TargetConfig {
    /// Create a config with the two required settings and defaults elsewhere
    pub fn new(s3_bucket: impl Into<String>, athena_database: impl Into<String>) -> Self {
        Self {
            s3_bucket: s3_bucket.into(),
            athena_database: athena_database.into(),
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            aws_endpoint: None,
            s3_staging_dir: None,
            athena_workgroup: None,
            s3_key_prefix: String::new(),
            naming_convention: None,
            object_format: ObjectFormat::default(),
            compression: default_compression(),
            encryption_type: None,
            encryption_key: None,
            flatten_records: false,
            delimiter: default_delimiter(),
            quotechar: default_quotechar(),
            temp_dir: None,
            table_prefix: None,
            batch_size_rows: DEFAULT_BATCH_SIZE_ROWS,
            ddl_timeout_secs: None,
            upload_timeout_secs: None,
            dry_run: false,
        }
    }

    /// Load configuration from a JSON or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and CSV dialect settings
    pub fn validate(&self) -> Result<()> {
        if self.s3_bucket.trim().is_empty() {
            return Err(Error::missing_field("s3_bucket"));
        }
        if self.athena_database.trim().is_empty() {
            return Err(Error::missing_field("athena_database"));
        }
        single_byte("delimiter", &self.delimiter)?;
        single_byte("quotechar", &self.quotechar)?;
        if self.batch_size_rows == 0 {
            return Err(Error::invalid_value(
                "batch_size_rows",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// CSV delimiter as a byte
    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte("delimiter", &self.delimiter)
    }

    /// CSV quote character as a byte
    pub fn quote_byte(&self) -> Result<u8> {
        single_byte("quotechar", &self.quotechar)
    }

    /// Directory for local buffer files, with `~` expanded
    pub fn resolved_temp_dir(&self) -> PathBuf {
        match self.temp_dir.as_deref() {
            Some(dir) => expand_home(dir),
            None => std::env::temp_dir(),
        }
    }

    /// Key prefix shared by every object of this target: `{s3_key_prefix}{database}/`
    pub fn object_prefix(&self) -> String {
        format!("{}{}/", self.s3_key_prefix, self.athena_database)
    }

    /// Table location for a stream: `s3://{bucket}/{s3_key_prefix}{database}/{stream}/`
    pub fn data_location(&self, stream: &str) -> String {
        format!(
            "s3://{}/{}{stream}/",
            self.s3_bucket,
            self.object_prefix()
        )
    }

    /// AWS region: config, then `AWS_REGION` / `AWS_DEFAULT_REGION`, then `us-east-1`
    pub fn region(&self) -> String {
        self.aws_region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .unwrap_or_else(|| "us-east-1".to_string())
    }

    /// Output location for Athena query results
    ///
    /// `s3_staging_dir`, then `S3_STAGING_DIR`, then `athena-results/` below
    /// the key prefix in the target bucket.
    pub fn staging_dir(&self) -> String {
        self.s3_staging_dir
            .clone()
            .or_else(|| std::env::var("S3_STAGING_DIR").ok())
            .unwrap_or_else(|| {
                format!(
                    "s3://{}/{}athena-results/",
                    self.s3_bucket, self.s3_key_prefix
                )
            })
    }

    /// Athena table name for a stream
    ///
    /// Prefixed with `table_prefix` (or the `TAP_NAME` environment variable)
    /// and with dashes replaced by underscores.
    pub fn table_name(&self, stream: &str) -> String {
        let prefix = self
            .table_prefix
            .clone()
            .or_else(|| std::env::var("TAP_NAME").ok())
            .filter(|p| !p.is_empty())
            .map(|p| format!("{p}_"))
            .unwrap_or_default();
        format!("{prefix}{stream}").replace('-', "_")
    }

    /// Deadline policy built from the timeout settings
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            ddl_timeout: self.ddl_timeout_secs.map(Duration::from_secs),
            upload_timeout: self.upload_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn single_byte(field: &str, value: &str) -> Result<u8> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(Error::invalid_value(
            field,
            format!("expected a single ASCII character, got '{value}'"),
        )),
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(path.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

// ============================================================================
// Call Policy
// ============================================================================

/// Deadlines around remote calls
///
/// Applied by the caller around DDL execution and uploads; a timed out
/// call is reported as [`Error::Timeout`] and never retried here.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallPolicy {
    /// Deadline for one DDL statement
    pub ddl_timeout: Option<Duration>,
    /// Deadline for one upload
    pub upload_timeout: Option<Duration>,
}

impl CallPolicy {
    /// No deadlines
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Run a DDL call under the DDL deadline
    pub async fn ddl<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        within("DDL execution", self.ddl_timeout, fut).await
    }

    /// Run an upload under the upload deadline
    pub async fn upload<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        within("Upload", self.upload_timeout, fut).await
    }
}

async fn within<T, F>(operation: &str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::timeout(operation, limit.as_millis() as u64))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TargetConfig::from_json(
            r#"{"s3_bucket": "lake", "athena_database": "analytics"}"#,
        )
        .unwrap();

        assert_eq!(config.object_format, ObjectFormat::Csv);
        assert_eq!(config.compression.as_deref(), Some("gzip"));
        assert_eq!(config.delimiter, ",");
        assert_eq!(config.quotechar, "\"");
        assert_eq!(config.batch_size_rows, DEFAULT_BATCH_SIZE_ROWS);
        assert!(!config.flatten_records);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_missing_required_field() {
        let result = TargetConfig::from_json(r#"{"s3_bucket": "lake"}"#);
        assert!(result.is_err());

        let result =
            TargetConfig::from_json(r#"{"s3_bucket": "", "athena_database": "analytics"}"#);
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingConfigField { .. }
        ));
    }

    #[test]
    fn test_invalid_delimiter() {
        let result = TargetConfig::from_json(
            r#"{"s3_bucket": "lake", "athena_database": "db", "delimiter": "||"}"#,
        );
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidConfigValue { .. }
        ));
    }

    #[test]
    fn test_null_compression_means_none() {
        let config = TargetConfig::from_json(
            r#"{"s3_bucket": "lake", "athena_database": "db", "compression": null}"#,
        )
        .unwrap();
        assert!(config.compression.is_none());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "s3_bucket: lake\nathena_database: raw\nobject_format: jsonl\nflatten_records: true"
        )
        .unwrap();

        let config = TargetConfig::from_file(&path).unwrap();
        assert_eq!(config.object_format, ObjectFormat::Jsonl);
        assert!(config.flatten_records);
    }

    #[test]
    fn test_locations() {
        let mut config = TargetConfig::new("lake", "analytics");
        config.s3_key_prefix = "singer/".to_string();

        assert_eq!(config.object_prefix(), "singer/analytics/");
        assert_eq!(
            config.data_location("orders"),
            "s3://lake/singer/analytics/orders/"
        );
    }

    #[test]
    fn test_explicit_staging_dir_and_region() {
        let mut config = TargetConfig::new("lake", "analytics");
        config.s3_staging_dir = Some("s3://results/athena/".to_string());
        config.aws_region = Some("eu-north-1".to_string());

        assert_eq!(config.staging_dir(), "s3://results/athena/");
        assert_eq!(config.region(), "eu-north-1");
    }

    #[test]
    fn test_table_name_cleaning() {
        let mut config = TargetConfig::new("lake", "analytics");
        config.table_prefix = Some("tap-shop".to_string());
        assert_eq!(config.table_name("order-items"), "tap_shop_order_items");
    }

    #[test]
    fn test_temp_dir_home_expansion() {
        let mut config = TargetConfig::new("lake", "analytics");
        config.temp_dir = Some("/var/tmp/athena".to_string());
        assert_eq!(config.resolved_temp_dir(), PathBuf::from("/var/tmp/athena"));

        if let Ok(home) = std::env::var("HOME") {
            config.temp_dir = Some("~/buffers".to_string());
            assert_eq!(
                config.resolved_temp_dir(),
                PathBuf::from(home).join("buffers")
            );
        }
    }

    #[tokio::test]
    async fn test_call_policy_timeout() {
        let policy = CallPolicy {
            ddl_timeout: Some(Duration::from_millis(10)),
            upload_timeout: None,
        };

        let result: Result<()> = policy
            .ddl(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));

        let result = policy.upload(async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }
}
