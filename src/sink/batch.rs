//! Per-stream batch sink

use super::types::{BatchReport, CleanupReport};
use crate::config::TargetConfig;
use crate::database::TableRegistrar;
use crate::error::Result;
use crate::flatten::KeyFlattener;
use crate::output::{compress_file, BatchSerializer, CloudDestination, CsvDialect};
use crate::schema::{compile_columns, header_columns, ColumnDefinition, SchemaNode, TableDescriptor};
use crate::template::{buffer_path, target_key, BatchStamp, StampSequence};
use crate::types::{Compression, JsonObject, ObjectFormat};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument, Span};

/// SerDe properties of the external table for a format
///
/// CSV tables get `separatorChar` / `quoteChar` only when the dialect
/// differs from the SerDe's own default.
pub fn serde_properties(format: ObjectFormat, dialect: CsvDialect) -> String {
    match format {
        ObjectFormat::Csv => {
            let mut properties = vec!["'case.insensitive'='true'".to_string()];
            if dialect.delimiter() != CsvDialect::default().delimiter() {
                properties.push(format!(
                    "'separatorChar'='{}'",
                    escape_literal(dialect.delimiter())
                ));
            }
            if dialect.quote() != CsvDialect::default().quote() {
                properties.push(format!("'quoteChar'='{}'", escape_literal(dialect.quote())));
            }
            properties.join(", ")
        }
        ObjectFormat::Jsonl => {
            "'ignore.malformed.json'='true', 'case.insensitive'='true'".to_string()
        }
    }
}

fn escape_literal(byte: u8) -> String {
    match byte {
        b'\'' => "\\'".to_string(),
        b'\\' => "\\\\".to_string(),
        b'\t' => "\\t".to_string(),
        other => char::from(other).to_string(),
    }
}

/// CSV dialect configured for the target
pub fn csv_dialect(config: &TargetConfig) -> Result<CsvDialect> {
    Ok(CsvDialect::new()
        .with_delimiter(config.delimiter_byte()?)
        .with_quote(config.quote_byte()?))
}

/// Column order a buffer file of `schema` should follow
///
/// Flattened schema keys when flattening, top-level property names
/// otherwise. Empty when the schema declares no properties.
pub fn preferred_header(config: &TargetConfig, schema: &SchemaNode) -> Vec<String> {
    if config.flatten_records {
        KeyFlattener::new().schema_keys(schema.fields())
    } else {
        schema.field_names()
    }
}

/// Header of a batch file: `preferred`, then any other key the rows carry
///
/// Keys appear in first-seen order after the preferred ones, so values under
/// objects the schema leaves open still get a column.
pub fn batch_header(preferred: Vec<String>, rows: &[JsonObject]) -> Vec<String> {
    let mut header = preferred;
    for key in rows.iter().flat_map(JsonObject::keys) {
        if !header.contains(key) {
            header.push(key.clone());
        }
    }
    header
}

/// Table columns for a batch file that ended up with `file_columns`
///
/// Unflattened JSONL keeps the nested structure of the schema; every other
/// layout is one STRING column per file column.
pub fn table_columns(
    config: &TargetConfig,
    schema: &SchemaNode,
    file_columns: &[String],
) -> Vec<ColumnDefinition> {
    let nested = config.object_format == ObjectFormat::Jsonl && !config.flatten_records;
    if nested && !schema.fields().is_empty() {
        compile_columns(schema)
    } else {
        header_columns(file_columns)
    }
}

/// Full table definition of `stream`
pub fn describe_table(
    config: &TargetConfig,
    stream: &str,
    schema: &SchemaNode,
    file_columns: &[String],
) -> Result<TableDescriptor> {
    let format = config.object_format;
    Ok(TableDescriptor::new(
        &config.athena_database,
        config.table_name(stream),
        table_columns(config, schema, file_columns),
    )
    .with_location(config.data_location(stream))
    .with_serde(format.serde())
    .with_serde_properties(serde_properties(format, csv_dialect(config)?))
    .with_skip_header(format.has_header()))
}

/// Writes batches of one stream to object storage and keeps its table current
///
/// Each batch goes through buffer, register, compress, upload and cleanup,
/// in that order, before the call returns.
#[derive(Debug)]
pub struct BatchSink {
    stream: String,
    table: String,
    schema: SchemaNode,
    config: Arc<TargetConfig>,
    registrar: TableRegistrar,
    destination: CloudDestination,
    flattener: KeyFlattener,
    stamps: StampSequence,
    span: Span,
}

impl BatchSink {
    /// Open a sink for `stream`
    ///
    /// Issues `CREATE DATABASE IF NOT EXISTS` for the configured database.
    pub async fn open(
        stream: impl Into<String>,
        schema: SchemaNode,
        config: Arc<TargetConfig>,
        registrar: TableRegistrar,
        destination: CloudDestination,
    ) -> Result<Self> {
        let stream = stream.into();
        let table = config.table_name(&stream);
        let span = tracing::info_span!(
            "sink",
            stream = %stream,
            database = %config.athena_database,
            table = %table
        );
        let registrar = registrar.with_span(span.clone());

        registrar.ensure_database(&config.athena_database).await?;

        Ok(Self {
            stream,
            table,
            schema,
            config,
            registrar,
            destination,
            flattener: KeyFlattener::new(),
            stamps: StampSequence::new(),
            span,
        })
    }

    /// Continue an existing stamp sequence, e.g. the one of the sink this replaces
    #[must_use]
    pub fn with_stamps(mut self, stamps: StampSequence) -> Self {
        self.stamps = stamps;
        self
    }

    /// Stamp sequence of this sink
    pub fn stamps(&self) -> &StampSequence {
        &self.stamps
    }

    /// Stream name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Stream schema
    pub fn schema(&self) -> &SchemaNode {
        &self.schema
    }

    fn format(&self) -> ObjectFormat {
        self.config.object_format
    }

    /// Column order the buffer file should follow
    pub fn preferred_header(&self) -> Vec<String> {
        preferred_header(&self.config, &self.schema)
    }

    /// Table columns for a batch whose file ended up with `file_columns`
    pub fn table_columns(&self, file_columns: &[String]) -> Vec<ColumnDefinition> {
        table_columns(&self.config, &self.schema, file_columns)
    }

    /// Table definition for a batch
    pub fn table_descriptor(&self, file_columns: &[String]) -> Result<TableDescriptor> {
        describe_table(&self.config, &self.stream, &self.schema, file_columns)
    }

    /// Process one batch stamped with the current time
    ///
    /// Returns `None` for an empty batch.
    pub async fn process_batch(&self, records: &[JsonObject]) -> Result<Option<BatchReport>> {
        self.process_batch_at(records, &BatchStamp::now()).await
    }

    /// Process one batch with a given stamp
    ///
    /// A stamp already used by the previous batch gets a sequence suffix.
    pub async fn process_batch_at(
        &self,
        records: &[JsonObject],
        stamp: &BatchStamp,
    ) -> Result<Option<BatchReport>> {
        if records.is_empty() {
            return Ok(None);
        }
        let stamp = self.stamps.next(stamp);
        self.run_batch(records, &stamp)
            .instrument(self.span.clone())
            .await
            .map(Some)
    }

    async fn run_batch(&self, records: &[JsonObject], stamp: &BatchStamp) -> Result<BatchReport> {
        let compression = Compression::parse(self.config.compression.as_deref())?;
        let format = self.format();

        let temp_dir = self.config.resolved_temp_dir();
        std::fs::create_dir_all(&temp_dir)?;
        let path = buffer_path(&temp_dir, &self.stream, stamp, format);

        let rows: Cow<'_, [JsonObject]> = if self.config.flatten_records {
            Cow::Owned(records.iter().map(|r| self.flattener.flatten(r)).collect())
        } else {
            Cow::Borrowed(records)
        };

        let mut serializer = BatchSerializer::new(&path, format)
            .with_dialect(csv_dialect(&self.config)?)
            .with_header(batch_header(self.preferred_header(), &rows));
        serializer.write(&rows)?;
        debug!("Buffered {} rows in {}", serializer.rows(), path.display());

        let descriptor = self.table_descriptor(serializer.columns())?;
        info!("Data location: {}", descriptor.location.as_deref().unwrap_or_default());
        let table_state = self.registrar.ensure_table(&descriptor).await?;

        let key = format!(
            "{}{}",
            target_key(
                &self.stream,
                format,
                &self.config.object_prefix(),
                stamp,
                self.config.naming_convention.as_deref(),
            ),
            compression.suffix()
        );

        let (upload_path, compressed) = compress_file(&path, compression)?;
        if compressed.is_some() {
            info!("Compressed {} as {}", path.display(), upload_path.display());
        }

        let uploaded = self
            .config
            .call_policy()
            .upload(self.destination.upload_file(&upload_path, &key))
            .await;

        match uploaded {
            Ok(uri) => {
                let cleanup = remove_files(std::iter::once(path).chain(compressed));
                Ok(BatchReport {
                    stream: self.stream.clone(),
                    table: self.table.clone(),
                    rows: serializer.rows(),
                    key,
                    uri,
                    columns: serializer.columns().to_vec(),
                    table_state,
                    cleanup,
                })
            }
            Err(e) => {
                // The buffer stays for inspection or a later retry
                error!("Upload of {} to {key} failed: {e}", path.display());
                remove_files(compressed);
                Err(e)
            }
        }
    }
}

/// Delete local files, logging rather than returning failures
fn remove_files(paths: impl IntoIterator<Item = PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to remove {}: {e}", path.display());
                report.failed.push(path);
            }
        }
    }
    report
}
