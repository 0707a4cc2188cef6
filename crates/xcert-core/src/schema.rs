//! # Schemas and Field Paths
//!
//! A [`Schema`] is an ordered, typed declaration of the fields a record
//! must carry. Order is significant: it fixes the leaf order of the hash
//! tree, so the same schema must be used at imprint, expose and verify
//! time.
//!
//! Nested record fields are flattened into the leaf layout depth-first,
//! each nested scalar addressed by its full [`FieldPath`]
//! (`["owner", "name"]`). A nested record therefore contributes one leaf per
//! scalar it contains and never a leaf of its own.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::SchemaId;
use crate::error::CertError;

/// Address of a field within a record, one segment per nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from its segments, outermost first.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty (root) path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This path extended by one segment.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Whether `prefix` addresses this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Unambiguous byte form hashed into every leaf:
    /// `u32 segment count || (u32 length || UTF-8 bytes)*`, big-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.0.iter().map(|s| 4 + s.len()).sum::<usize>());
        out.extend_from_slice(&(self.0.len() as u32).to_be_bytes());
        for segment in &self.0 {
            out.extend_from_slice(&(segment.len() as u32).to_be_bytes());
            out.extend_from_slice(segment.as_bytes());
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Opaque binary blob.
    Bytes,
    /// Signed 64-bit integer.
    Integer,
    /// Nested record with its own ordered fields.
    Record(Vec<FieldDescriptor>),
}

impl FieldType {
    /// Lowercase type name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Integer => "integer",
            Self::Record(_) => "record",
        }
    }

    /// Whether values of this type occupy exactly one leaf.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Record(_))
    }
}

/// One declared field: its name at this nesting level and its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique among its siblings.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    /// A string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
        }
    }

    /// A binary blob field.
    pub fn bytes(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Bytes,
        }
    }

    /// An integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Integer,
        }
    }

    /// A nested record field.
    pub fn record(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Record(fields),
        }
    }
}

/// A scalar position in the flattened leaf layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSlot {
    /// Full path of the scalar field.
    pub path: FieldPath,
    /// Its scalar type.
    pub field_type: FieldType,
}

/// An ordered, validated field declaration with its identifier.
///
/// # Invariants
///
/// - At least one field at every nesting level.
/// - Field names are non-empty and unique among siblings.
/// - `layout` is the depth-first flattening of `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct Schema {
    id: SchemaId,
    fields: Vec<FieldDescriptor>,
    layout: Vec<LeafSlot>,
}

impl Schema {
    /// Validate a field declaration under a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// `CertError::InvalidSchema` if any nesting level is empty, a name is
    /// empty, or two siblings share a name.
    pub fn new(id: SchemaId, fields: Vec<FieldDescriptor>) -> Result<Self, CertError> {
        let mut layout = Vec::new();
        flatten(&fields, &FieldPath::default(), &mut layout)?;
        Ok(Self { id, fields, layout })
    }

    /// Validate a field declaration and identify it by the SHA-256 of its
    /// JCS form.
    pub fn with_derived_id(fields: Vec<FieldDescriptor>) -> Result<Self, CertError> {
        let id = SchemaId::derive(&fields)?;
        Self::new(id, fields)
    }

    /// The schema identifier.
    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    /// Top-level field declarations in order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Flattened scalar layout, in leaf order.
    pub fn layout(&self) -> &[LeafSlot] {
        &self.layout
    }

    /// Number of leaves every conforming record encodes to.
    pub fn leaf_count(&self) -> usize {
        self.layout.len()
    }

    /// Leaf indices addressed by `path`: the leaf itself for a scalar path,
    /// every nested leaf for a record path, nothing for an unknown path.
    pub fn leaf_indices(&self, path: &FieldPath) -> Vec<usize> {
        if path.is_empty() {
            return Vec::new();
        }
        self.layout
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.path.starts_with(path))
            .map(|(i, _)| i)
            .collect()
    }
}

fn flatten(
    fields: &[FieldDescriptor],
    prefix: &FieldPath,
    layout: &mut Vec<LeafSlot>,
) -> Result<(), CertError> {
    if fields.is_empty() {
        let at = if prefix.is_empty() {
            "schema".to_string()
        } else {
            format!("record `{prefix}`")
        };
        return Err(CertError::InvalidSchema(format!("{at} declares no fields")));
    }
    let mut seen = BTreeSet::new();
    for field in fields {
        if field.name.is_empty() {
            return Err(CertError::InvalidSchema(format!(
                "empty field name under `{prefix}`"
            )));
        }
        let path = prefix.child(&field.name);
        if !seen.insert(field.name.as_str()) {
            return Err(CertError::InvalidSchema(format!("duplicate field `{path}`")));
        }
        match &field.field_type {
            FieldType::Record(nested) => flatten(nested, &path, layout)?,
            scalar => layout.push(LeafSlot { path, field_type: scalar.clone() }),
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct SchemaDocument {
    id: SchemaId,
    fields: Vec<FieldDescriptor>,
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = CertError;

    fn try_from(doc: SchemaDocument) -> Result<Self, Self::Error> {
        Schema::new(doc.id, doc.fields)
    }
}

impl From<Schema> for SchemaDocument {
    fn from(schema: Schema) -> Self {
        Self {
            id: schema.id,
            fields: schema.fields,
        }
    }
}
