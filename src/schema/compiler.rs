//! Schema to Hive DDL compiler
//!
//! Turns a [`SchemaNode`] into the column list of an Athena external table
//! and renders the `CREATE` statements around it.
//!
//! Every leaf is declared as `STRING`, whatever JSON type it declares.
//! Objects become `STRUCT<...>` and arrays become `ARRAY<...>`, so only the
//! nesting shape of the schema survives into the table.

use super::types::{SchemaField, SchemaNode};

const TAB: &str = "  ";

/// Column type for every leaf
pub const STRING_TYPE: &str = "STRING";

/// One compiled column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column (or struct member) name
    pub name: String,
    /// Hive type text, possibly spanning several lines for nested types
    pub hive_type: String,
    /// 0 for table columns, 1 for their struct members, ...
    pub nesting_level: usize,
}

impl ColumnDefinition {
    /// Create a column
    pub fn new(name: impl Into<String>, hive_type: impl Into<String>, nesting_level: usize) -> Self {
        Self {
            name: name.into(),
            hive_type: hive_type.into(),
            nesting_level,
        }
    }

    /// A top-level `STRING` column
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, STRING_TYPE, 0)
    }

    /// Indented definition line: `` `name` TYPE `` at the top level,
    /// `` `name`: TYPE `` inside a struct
    pub fn render(&self) -> String {
        let indentation = TAB.repeat(self.nesting_level + 1);
        let separator = if self.nesting_level == 0 { " " } else { ": " };
        format!("{indentation}`{}`{separator}{}", self.name, self.hive_type)
    }

    /// Definition without indentation, for `REPLACE COLUMNS`
    pub fn render_inline(&self) -> String {
        format!("`{}` {}", self.name, self.hive_type)
    }
}

/// Compile the top-level fields of a schema into table columns
pub fn compile_columns(schema: &SchemaNode) -> Vec<ColumnDefinition> {
    compile_fields(schema.fields(), 0)
}

/// Compile fields at a nesting level
pub fn compile_fields(fields: &[SchemaField], level: usize) -> Vec<ColumnDefinition> {
    fields
        .iter()
        .map(|field| ColumnDefinition::new(&field.name, hive_type(&field.node, level), level))
        .collect()
}

/// One `STRING` column per header, in header order
pub fn header_columns<S: AsRef<str>>(headers: &[S]) -> Vec<ColumnDefinition> {
    headers
        .iter()
        .map(|h| ColumnDefinition::string(h.as_ref()))
        .collect()
}

/// Columns for a table: the explicit header list when given, otherwise the
/// schema compiled recursively
pub fn derive_columns<S: AsRef<str>>(
    schema: &SchemaNode,
    headers: Option<&[S]>,
) -> Vec<ColumnDefinition> {
    match headers {
        Some(headers) => header_columns(headers),
        None => compile_columns(schema),
    }
}

/// Join rendered columns with `,\n`
pub fn render_columns(columns: &[ColumnDefinition]) -> String {
    columns
        .iter()
        .map(ColumnDefinition::render)
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Hive type of a node declared at `level`
fn hive_type(node: &SchemaNode, level: usize) -> String {
    let indentation = TAB.repeat(level + 1);
    match node {
        SchemaNode::Object(fields) if !fields.is_empty() => format!(
            "STRUCT<\n{}\n{indentation}>",
            render_columns(&compile_fields(fields, level + 1))
        ),
        SchemaNode::Array(items) => match items.as_ref() {
            SchemaNode::Object(fields) if !fields.is_empty() => format!(
                "ARRAY<STRUCT<\n{}\n{}>\n{indentation}>",
                render_columns(&compile_fields(fields, level + 2)),
                TAB.repeat(level + 2)
            ),
            SchemaNode::Primitive(name) if is_plain_type_name(name) => {
                format!("ARRAY<{}>", name.to_uppercase())
            }
            SchemaNode::Array(_) => format!("ARRAY<{}>", hive_type(items, level + 1)),
            _ => format!("ARRAY<{STRING_TYPE}>"),
        },
        SchemaNode::Object(_) => {
            tracing::warn!("Object without properties declared as {STRING_TYPE}");
            STRING_TYPE.to_string()
        }
        SchemaNode::Primitive(_) | SchemaNode::Nullable(_) => STRING_TYPE.to_string(),
    }
}

fn is_plain_type_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Statements
// ============================================================================

/// Arguments of a `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Database (namespace)
    pub database: String,
    /// Table name
    pub table: String,
    /// Compiled columns
    pub columns: Vec<ColumnDefinition>,
    /// Object store URI of the table data
    pub location: Option<String>,
    /// Emit `CREATE EXTERNAL TABLE`
    pub external: bool,
    /// Row format SerDe class
    pub serde: Option<String>,
    /// Raw SerDe property list, e.g. `'case.insensitive'='true'`
    pub serde_properties: Option<String>,
    /// Storage format
    pub stored_as: Option<String>,
    /// Header lines skipped by readers
    pub skip_header_lines: u32,
}

impl TableDescriptor {
    /// External `TEXTFILE` table with no SerDe, location or header skip
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            columns,
            location: None,
            external: true,
            serde: None,
            serde_properties: None,
            stored_as: Some("TEXTFILE".to_string()),
            skip_header_lines: 0,
        }
    }

    /// Set the data location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the row format SerDe
    #[must_use]
    pub fn with_serde(mut self, serde: impl Into<String>) -> Self {
        self.serde = Some(serde.into());
        self
    }

    /// Set the SerDe properties
    #[must_use]
    pub fn with_serde_properties(mut self, properties: impl Into<String>) -> Self {
        self.serde_properties = Some(properties.into());
        self
    }

    /// Set the storage format, `None` drops the clause
    #[must_use]
    pub fn with_stored_as(mut self, stored_as: Option<String>) -> Self {
        self.stored_as = stored_as;
        self
    }

    /// Skip one header line when `skip` is set
    #[must_use]
    pub fn with_skip_header(mut self, skip: bool) -> Self {
        self.skip_header_lines = u32::from(skip);
        self
    }

    /// Make the table managed instead of external
    #[must_use]
    pub fn managed(mut self) -> Self {
        self.external = false;
        self
    }

    /// `{database}.{table}`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Render `CREATE [EXTERNAL ]TABLE IF NOT EXISTS ...;`
///
/// Optional clauses are left out entirely when their input is absent.
/// `LOCATION` is only emitted for external tables.
pub fn render_create_table(table: &TableDescriptor) -> String {
    let external_marker = if table.external { "EXTERNAL " } else { "" };

    let mut clauses = Vec::new();
    if let Some(serde) = &table.serde {
        clauses.push(format!("ROW FORMAT SERDE '{serde}'"));
    }
    if let Some(properties) = &table.serde_properties {
        clauses.push(format!("WITH SERDEPROPERTIES ({properties})"));
    }
    if let Some(stored_as) = &table.stored_as {
        clauses.push(format!("STORED AS {stored_as}"));
    }
    if let (true, Some(location)) = (table.external, &table.location) {
        clauses.push(format!("LOCATION '{location}'"));
    }
    if table.skip_header_lines > 0 {
        clauses.push(format!(
            "TBLPROPERTIES (\"skip.header.line.count\" = \"{}\")",
            table.skip_header_lines
        ));
    }

    let mut statement = format!(
        "CREATE {external_marker}TABLE IF NOT EXISTS {} (\n{}\n)",
        table.qualified_name(),
        render_columns(&table.columns)
    );
    for clause in clauses {
        statement.push('\n');
        statement.push_str(&clause);
    }
    statement.push(';');
    statement
}

/// Render `CREATE DATABASE IF NOT EXISTS {name};`
pub fn render_create_database(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {name};")
}
