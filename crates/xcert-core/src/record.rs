//! # Records and Values
//!
//! A [`Record`] maps field names to typed [`Value`]s. Records are plain
//! data; nothing about them is checked until they pass through
//! [`crate::encoding::encode`] together with a schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldPath, FieldType};

/// A typed field value.
///
/// Serializes adjacently tagged (`{"type": "bytes", "value": "0a0b"}`);
/// binary blobs travel as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// UTF-8 text.
    String(String),
    /// Binary blob.
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Nested record.
    Record(Record),
}

impl Value {
    /// Whether this value may occupy a field of type `field_type`.
    /// Nested records match any record type; their fields are checked
    /// during encoding.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (Self::String(_), FieldType::String)
                | (Self::Bytes(_), FieldType::Bytes)
                | (Self::Integer(_), FieldType::Integer)
                | (Self::Record(_), FieldType::Record(_))
        )
    }

    /// Lowercase type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Integer(_) => "integer",
            Self::Record(_) => "record",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

/// A mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Look up a top-level field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Look up a possibly nested field by full path.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.0.get(first)?;
        for segment in rest {
            match current {
                Value::Record(inner) => current = inner.0.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Field names present in this record.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
