//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! [`Target`] reads tap messages line by line, keeps one [`BatchSink`] and
//! one record buffer per stream, and flushes a stream when
//!
//! - its buffer reaches `batch_size_rows`,
//! - a new, different schema arrives for it,
//! - the input ends.
//!
//! State messages are held back until no stream has buffered records, then
//! the latest one is written to the output.

mod types;

pub use types::{Message, TargetStats};

use crate::config::TargetConfig;
use crate::database::{AthenaClient, DryRunEngine, QueryEngine, TableRegistrar};
use crate::error::{Error, Result};
use crate::output::CloudDestination;
use crate::schema::SchemaNode;
use crate::sink::BatchSink;
use crate::types::{JsonObject, JsonValue};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, Instrument, Span};

/// Per-stream state: the sink and the records waiting for it
struct StreamBuffer {
    schema: JsonValue,
    sink: BatchSink,
    records: Vec<JsonObject>,
}

/// Routes tap messages to per-stream batch sinks
pub struct Target {
    config: Arc<TargetConfig>,
    engine: Option<Arc<dyn QueryEngine>>,
    destination: Option<CloudDestination>,
    streams: BTreeMap<String, StreamBuffer>,
    pending_state: Option<JsonValue>,
    stats: TargetStats,
    span: Span,
}

impl Target {
    /// Create a target; clients are created on first use
    pub fn new(config: TargetConfig) -> Self {
        let span = tracing::info_span!(
            "target",
            bucket = %config.s3_bucket,
            database = %config.athena_database
        );
        Self {
            config: Arc::new(config),
            engine: None,
            destination: None,
            streams: BTreeMap::new(),
            pending_state: None,
            stats: TargetStats::default(),
            span,
        }
    }

    /// Use `engine` instead of the one derived from the config
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use `destination` instead of the bucket from the config
    #[must_use]
    pub fn with_destination(mut self, destination: CloudDestination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> &TargetStats {
        &self.stats
    }

    /// Number of records buffered for `stream`
    pub fn buffered(&self, stream: &str) -> usize {
        self.streams.get(stream).map_or(0, |s| s.records.len())
    }

    fn query_engine(&mut self) -> Result<Arc<dyn QueryEngine>> {
        if let Some(engine) = &self.engine {
            return Ok(Arc::clone(engine));
        }
        let engine: Arc<dyn QueryEngine> = if self.config.dry_run {
            Arc::new(DryRunEngine::new())
        } else {
            Arc::new(AthenaClient::from_config(&self.config)?)
        };
        debug!("Using query engine '{}'", engine.name());
        self.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    fn destination(&mut self) -> Result<CloudDestination> {
        if let Some(destination) = &self.destination {
            return Ok(destination.clone());
        }
        let destination = CloudDestination::from_config(&self.config)?;
        self.destination = Some(destination.clone());
        Ok(destination)
    }

    /// Read messages from `input` until it ends, then flush every stream
    ///
    /// Emitted state lines are written to `output`.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<TargetStats>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let start = Instant::now();
        let mut lines = input.lines();
        let mut line_number = 0;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let message = Message::parse(&line, line_number)?;
            self.process_message(message, output).await?;
        }

        self.drain_all(output).await?;
        info!(
            parent: &self.span,
            "Finished in {} ms: {} records in {} batches",
            start.elapsed().as_millis(),
            self.stats.records,
            self.stats.batches
        );
        Ok(self.stats.clone())
    }

    /// Handle a single message
    pub async fn process_message<W: Write>(
        &mut self,
        message: Message,
        output: &mut W,
    ) -> Result<()> {
        self.stats.messages += 1;
        match message {
            Message::Schema { stream, schema, .. } => self.open_stream(stream, schema).await,
            Message::Record { stream, record } => {
                let batch_size = self.config.batch_size_rows;
                let buffer = self
                    .streams
                    .get_mut(&stream)
                    .ok_or_else(|| Error::SchemaNotFound {
                        stream: stream.clone(),
                    })?;
                buffer.records.push(record);
                self.stats.records += 1;

                if buffer.records.len() >= batch_size {
                    self.flush_stream(&stream).await?;
                    self.emit_state_if_drained(output)?;
                }
                Ok(())
            }
            Message::State { value } => {
                self.pending_state = Some(value);
                self.emit_state_if_drained(output)
            }
            Message::ActivateVersion { stream, .. } => {
                debug!(parent: &self.span, "Ignoring ACTIVATE_VERSION for '{stream}'");
                Ok(())
            }
        }
    }

    async fn open_stream(&mut self, stream: String, schema: JsonValue) -> Result<()> {
        if !schema.is_object() {
            return Err(Error::schema(&stream, "schema must be a JSON object"));
        }
        if self.streams.get(&stream).is_some_and(|s| s.schema == schema) {
            return Ok(());
        }
        // Records buffered under the previous schema go out first
        self.flush_stream(&stream).await?;

        let stamps = self
            .streams
            .get(&stream)
            .map(|s| s.sink.stamps().clone())
            .unwrap_or_default();
        let registrar =
            TableRegistrar::new(self.query_engine()?).with_policy(self.config.call_policy());
        let sink = BatchSink::open(
            stream.clone(),
            SchemaNode::from_json(&schema),
            Arc::clone(&self.config),
            registrar,
            self.destination()?,
        )
        .instrument(self.span.clone())
        .await?
        .with_stamps(stamps);

        let buffer = StreamBuffer {
            schema,
            sink,
            records: Vec::new(),
        };
        if self.streams.insert(stream.clone(), buffer).is_none() {
            self.stats.streams += 1;
        }
        info!(parent: &self.span, "Opened stream '{stream}'");
        Ok(())
    }

    async fn flush_stream(&mut self, stream: &str) -> Result<()> {
        let Some(buffer) = self.streams.get_mut(stream) else {
            return Ok(());
        };
        if buffer.records.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut buffer.records);
        if let Some(report) = buffer
            .sink
            .process_batch(&records)
            .instrument(self.span.clone())
            .await?
        {
            info!(
                parent: &self.span,
                "Wrote {} rows of '{}' to {}", report.rows, report.stream, report.uri
            );
            self.stats.add_batch(report.rows);
        }
        Ok(())
    }

    /// Flush every stream, then emit the pending state
    pub async fn drain_all<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let streams: Vec<String> = self.streams.keys().cloned().collect();
        for stream in streams {
            self.flush_stream(&stream).await?;
        }
        self.emit_state_if_drained(output)
    }

    fn emit_state_if_drained<W: Write>(&mut self, output: &mut W) -> Result<()> {
        if self.streams.values().any(|s| !s.records.is_empty()) {
            return Ok(());
        }
        if let Some(state) = self.pending_state.take() {
            writeln!(output, "{}", serde_json::to_string(&state)?)?;
            output.flush()?;
            self.stats.states_emitted += 1;
            debug!(parent: &self.span, "Emitted state");
        }
        Ok(())
    }
}
