//! Batch file writer
//!
//! Appends records to the local buffer file of a batch, as CSV with a
//! header row or as newline-delimited JSON.

use crate::error::Result;
use crate::types::{JsonObject, JsonValue, ObjectFormat};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// CSV delimiter and quote character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    delimiter: u8,
    quote: u8,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

impl CsvDialect {
    /// Create the default `,` / `"` dialect
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the quote character
    #[must_use]
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    /// Get the field delimiter
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Get the quote character
    #[must_use]
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// Whether this is the dialect Athena's CSV SerDe assumes
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Text of one CSV cell
///
/// Strings have their line feeds replaced by the two characters `\n` since
/// Athena's CSV reader cannot handle embedded line breaks. `null` becomes an
/// empty cell; everything else is written as its JSON text.
pub fn csv_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.replace('\n', "\\n"),
        other => other.to_string(),
    }
}

fn is_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map_or(true, |m| m.len() == 0)
}

fn read_csv_header(path: &Path, dialect: CsvDialect) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .has_headers(true)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Append records to a CSV file
///
/// A new or empty file gets a header row first: `header` when given and not
/// empty, otherwise the keys of the first record. An existing file keeps the
/// header it already has. Record keys missing from the header are ignored
/// and header columns missing from a record are left empty.
///
/// Returns the header of the file.
pub fn append_csv(
    path: &Path,
    records: &[JsonObject],
    header: Option<&[String]>,
    dialect: CsvDialect,
) -> Result<Vec<String>> {
    let is_new = is_empty_file(path);
    let columns: Vec<String> = if is_new {
        match header {
            Some(h) if !h.is_empty() => h.to_vec(),
            _ => records
                .first()
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default(),
        }
    } else {
        read_csv_header(path, dialect)?
    };

    if records.is_empty() {
        return Ok(columns);
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .from_writer(BufWriter::new(file));

    if is_new {
        writer.write_record(&columns)?;
    }

    let mut ignored = 0usize;
    for record in records {
        ignored += record.keys().filter(|k| !columns.contains(k)).count();
        let row = columns
            .iter()
            .map(|column| record.get(column).map(csv_cell).unwrap_or_default());
        writer.write_record(row)?;
    }
    writer.flush()?;

    if ignored > 0 {
        tracing::debug!(
            "Ignored {ignored} values without a column in {}",
            path.display()
        );
    }

    Ok(columns)
}

/// Append records to a newline-delimited JSON file
pub fn append_jsonl(path: &Path, records: &[JsonObject]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Batch Serializer
// ============================================================================

/// Writer for one batch buffer file
///
/// Keeps track of the columns the file ends up with: the CSV header, or for
/// JSONL every key seen, starting with the preferred header.
#[derive(Debug)]
pub struct BatchSerializer {
    path: PathBuf,
    format: ObjectFormat,
    dialect: CsvDialect,
    columns: Vec<String>,
    rows: usize,
}

impl BatchSerializer {
    /// Create a serializer for `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>, format: ObjectFormat) -> Self {
        Self {
            path: path.into(),
            format,
            dialect: CsvDialect::default(),
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Set the CSV dialect
    #[must_use]
    pub fn with_dialect(mut self, dialect: CsvDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the preferred column order
    #[must_use]
    pub fn with_header(mut self, header: Vec<String>) -> Self {
        self.columns = header;
        self
    }

    /// Append records
    pub fn write(&mut self, records: &[JsonObject]) -> Result<()> {
        match self.format {
            ObjectFormat::Csv => {
                let header = (!self.columns.is_empty()).then_some(self.columns.as_slice());
                self.columns = append_csv(&self.path, records, header, self.dialect)?;
            }
            ObjectFormat::Jsonl => {
                append_jsonl(&self.path, records)?;
                for key in records.iter().flat_map(JsonObject::keys) {
                    if !self.columns.contains(key) {
                        self.columns.push(key.clone());
                    }
                }
            }
        }
        self.rows += records.len();
        Ok(())
    }

    /// Columns of the file
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Buffer file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer file format
    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Whether the buffer file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Open the buffer file for reading
    pub fn open(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }
}
