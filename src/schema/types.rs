//! Schema types

use crate::types::JsonValue;

/// Nested type descriptor parsed from a stream's JSON Schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// Leaf with its declared JSON type name (`string`, `integer`, ...)
    Primitive(String),
    /// Union that includes `null`
    Nullable(Box<SchemaNode>),
    /// Object with ordered fields
    Object(Vec<SchemaField>),
    /// Array of items
    Array(Box<SchemaNode>),
}

/// Named member of an object schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Field name
    pub name: String,
    /// Field type
    pub node: SchemaNode,
}

impl SchemaField {
    /// Create a field
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

impl SchemaNode {
    /// Create a primitive leaf
    pub fn primitive(type_name: impl Into<String>) -> Self {
        SchemaNode::Primitive(type_name.into())
    }

    /// Wrap a node in a nullable union
    pub fn nullable(inner: SchemaNode) -> Self {
        SchemaNode::Nullable(Box::new(inner))
    }

    /// Create an array node
    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array(Box::new(items))
    }

    /// Parse a JSON Schema document
    ///
    /// Never fails: shapes that cannot be understood are logged and treated
    /// as a `string` leaf.
    pub fn from_json(schema: &JsonValue) -> Self {
        let Some(map) = schema.as_object() else {
            tracing::warn!("Schema node is not an object, treating as string: {schema}");
            return SchemaNode::primitive("string");
        };

        match map.get("type") {
            Some(JsonValue::String(type_name)) => Self::from_type_name(type_name, schema),
            Some(JsonValue::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(JsonValue::as_str).collect();
                let non_null: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();
                let inner = match non_null.as_slice() {
                    [] => SchemaNode::primitive("null"),
                    [single] => Self::from_type_name(single, schema),
                    many => SchemaNode::primitive(many.join("|")),
                };
                if names.len() == non_null.len() {
                    inner
                } else {
                    SchemaNode::nullable(inner)
                }
            }
            Some(other) => {
                tracing::warn!("Unsupported schema type declaration {other}, treating as string");
                SchemaNode::primitive("string")
            }
            None if map.contains_key("properties") => Self::from_type_name("object", schema),
            None => {
                tracing::warn!("Schema node without a type, treating as string: {schema}");
                SchemaNode::primitive("string")
            }
        }
    }

    fn from_type_name(type_name: &str, schema: &JsonValue) -> Self {
        match type_name {
            "object" => {
                let fields = schema
                    .get("properties")
                    .and_then(JsonValue::as_object)
                    .map(|properties| {
                        properties
                            .iter()
                            .map(|(name, property)| SchemaField::new(name, Self::from_json(property)))
                            .collect()
                    })
                    .unwrap_or_default();
                SchemaNode::Object(fields)
            }
            "array" => {
                let items = schema
                    .get("items")
                    .map_or_else(|| SchemaNode::primitive("string"), Self::from_json);
                SchemaNode::array(items)
            }
            other => SchemaNode::primitive(other),
        }
    }

    /// The node with any nullable wrapper removed
    pub fn non_null(&self) -> &SchemaNode {
        match self {
            SchemaNode::Nullable(inner) => inner.non_null(),
            other => other,
        }
    }

    /// Check if this node is a nullable union
    pub fn is_nullable(&self) -> bool {
        matches!(self, SchemaNode::Nullable(_))
    }

    /// Fields of an object node (looking through nullability); empty otherwise
    pub fn fields(&self) -> &[SchemaField] {
        match self.non_null() {
            SchemaNode::Object(fields) => fields,
            _ => &[],
        }
    }

    /// Names of the top-level fields, in declaration order
    pub fn field_names(&self) -> Vec<String> {
        self.fields().iter().map(|f| f.name.clone()).collect()
    }
}
