//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::TargetConfig;
use crate::engine::Target;
use crate::error::{Error, Result, ResultExt};
use crate::schema::{render_create_database, render_create_table, SchemaNode};
use crate::sink::{csv_dialect, describe_table, preferred_header};
use crate::types::{Compression, JsonValue, ObjectFormat};
use std::path::Path;
use tokio::io::BufReader;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            None => self.load(None).await,
            Some(Commands::Run { input }) => self.load(input.as_deref()).await,
            Some(Commands::Ddl {
                schema,
                stream,
                database,
                format,
                flatten,
                location,
            }) => {
                let options = DdlOptions {
                    database: database.clone(),
                    format: *format,
                    flatten: *flatten,
                    location: location.clone(),
                };
                self.ddl(schema, stream, &options)
            }
            Some(Commands::Validate) => self.validate(),
        }
    }

    /// Load config from `--config` or `--config-json`, if either is given
    fn load_config(&self) -> Result<Option<TargetConfig>> {
        if let Some(json) = &self.cli.config_json {
            return TargetConfig::from_json(json).map(Some);
        }
        self.cli
            .config
            .as_ref()
            .map(TargetConfig::from_file)
            .transpose()
    }

    fn require_config(&self) -> Result<TargetConfig> {
        self.load_config()?
            .ok_or_else(|| Error::config("Config not specified (use --config or --config-json)"))
    }

    /// Read messages and load them; state lines go to stdout
    async fn load(&self, input: Option<&Path>) -> Result<()> {
        let config = self.require_config()?;
        let mut target = Target::new(config);
        let mut stdout = std::io::stdout();

        let stats = match input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                target.run(BufReader::new(file), &mut stdout).await?
            }
            None => target.run(BufReader::new(tokio::io::stdin()), &mut stdout).await?,
        };

        info!(
            "Loaded {} records from {} streams in {} batches",
            stats.records, stats.streams, stats.batches
        );
        Ok(())
    }

    /// Print the DDL for a schema file
    fn ddl(&self, schema_path: &Path, stream: &str, options: &DdlOptions) -> Result<()> {
        let content = std::fs::read_to_string(schema_path)
            .with_context(|| format!("Failed to read {}", schema_path.display()))?;
        let schema: JsonValue = serde_json::from_str(&content)?;
        let config = self.load_config()?;

        println!("{}", render_ddl(config, stream, &schema, options)?);
        Ok(())
    }

    /// Validate the configuration and print a summary
    fn validate(&self) -> Result<()> {
        let config = self.require_config()?;
        let compression = Compression::parse(config.compression.as_deref())?;
        csv_dialect(&config)?;

        println!("Configuration is valid");
        println!("  Bucket:      {}", config.s3_bucket);
        println!("  Database:    {}", config.athena_database);
        println!("  Region:      {}", config.region());
        println!("  Format:      {}", config.object_format);
        println!(
            "  Compression: {}",
            match compression {
                Compression::None => "none",
                Compression::Gzip => "gzip",
            }
        );
        println!("  Flatten:     {}", config.flatten_records);
        println!("  Staging dir: {}", config.staging_dir());
        Ok(())
    }
}

/// Overrides for the `ddl` command
#[derive(Debug, Clone, Default)]
pub struct DdlOptions {
    /// Database
    pub database: Option<String>,
    /// Object format
    pub format: Option<ObjectFormat>,
    /// Flatten records
    pub flatten: bool,
    /// Table location
    pub location: Option<String>,
}

/// Render the database and table DDL a stream schema compiles to
///
/// `schema` may be a bare JSON Schema or a whole SCHEMA message. Without a
/// config the table gets no location unless one is given.
pub fn render_ddl(
    config: Option<TargetConfig>,
    stream: &str,
    schema: &JsonValue,
    options: &DdlOptions,
) -> Result<String> {
    let has_config = config.is_some();
    let mut config = config.unwrap_or_else(|| TargetConfig::new("", "default"));
    if let Some(database) = &options.database {
        config.athena_database.clone_from(database);
    }
    if let Some(format) = options.format {
        config.object_format = format;
    }
    config.flatten_records |= options.flatten;

    let schema = match schema.get("type").and_then(JsonValue::as_str) {
        Some("SCHEMA") => schema
            .get("schema")
            .ok_or_else(|| Error::schema(stream, "SCHEMA message without a schema"))?,
        _ => schema,
    };
    let schema = SchemaNode::from_json(schema);

    let mut table = describe_table(
        &config,
        stream,
        &schema,
        &preferred_header(&config, &schema),
    )?;
    if options.location.is_some() || !has_config {
        table.location.clone_from(&options.location);
    }

    Ok(format!(
        "{}\n\n{}",
        render_create_database(&config.athena_database),
        render_create_table(&table)
    ))
}
