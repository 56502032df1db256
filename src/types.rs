//! Dynamic row model shared by the decoders, the census, and the importer.
//!
//! The pipeline never knows a dataset's shape at compile time, so a row is a
//! list of `(column name, scalar)` pairs in source order and a schema is a
//! list of [`ColumnDescriptor`]s derived from the data itself.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A single untyped scalar as read from a source.
///
/// Values are kept verbatim: delimited text yields [`Value::Text`] (or
/// [`Value::Null`] for empty fields), JSON and workbook cells keep their
/// native scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Text(String),
}

impl Value {
    /// Coarse type tag used by the column census.
    ///
    /// Free-form at this layer; precise typing is a display concern.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "unknown",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "number",
            Value::Text(_) => "text",
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One decoded row: column names mapped to scalar values, in the order the
/// source presented them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Build a row from `(name, value)` pairs, keeping their order.
    pub fn from_pairs(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Column names in source order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate `(name, value)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the row carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A named column together with its coarse inferred type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as it appears in the source (unsanitized).
    pub name: String,
    /// Coarse type tag inferred from the first row (see [`Value::kind`]).
    pub kind: String,
}

impl ColumnDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}
