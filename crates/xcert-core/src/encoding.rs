//! # Canonical Leaf Encoding
//!
//! Turns a record into the ordered leaves a hash tree is built over. This
//! is the only path from a [`Record`] to bytes that an imprint commits to.
//!
//! ## Leaf Value Layout
//!
//! Every leaf value begins with a one-byte type tag so that, for example,
//! the string `"1"` and the integer `1` at the same path never encode
//! identically:
//!
//! | Type    | Bytes |
//! |---------|-------|
//! | string  | `0x01 ‖ u64 BE length ‖ UTF-8` |
//! | bytes   | `0x02 ‖ u64 BE length ‖ raw` |
//! | integer | `0x03 ‖ i64 BE` |
//!
//! Nested records are not leaves; their scalar fields are encoded in
//! declaration order under the parent path.
//!
//! ## Determinism
//!
//! Encoding is a pure function of `(record, schema)`: leaf order comes from
//! the schema, never from the record's own map order.

use crate::error::CertError;
use crate::record::{Record, Value};
use crate::schema::{FieldDescriptor, FieldPath, FieldType, Schema};

const TAG_STRING: u8 = 0x01;
const TAG_BYTES: u8 = 0x02;
const TAG_INTEGER: u8 = 0x03;

/// One encoded scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Full path of the field.
    pub path: FieldPath,
    /// Tagged, length-prefixed value bytes.
    pub value: Vec<u8>,
}

/// Encode `record` under `schema` into leaves in schema order.
///
/// # Errors
///
/// - `CertError::MissingField` if a declared field is absent.
/// - `CertError::InvalidSchema` if the record carries an undeclared field or
///   a value whose type differs from the declaration.
pub fn encode(record: &Record, schema: &Schema) -> Result<Vec<Leaf>, CertError> {
    let mut leaves = Vec::with_capacity(schema.leaf_count());
    encode_fields(record, schema.fields(), &FieldPath::default(), &mut leaves)?;
    Ok(leaves)
}

fn encode_fields(
    record: &Record,
    fields: &[FieldDescriptor],
    prefix: &FieldPath,
    out: &mut Vec<Leaf>,
) -> Result<(), CertError> {
    if let Some(unknown) = record.names().find(|n| !fields.iter().any(|f| f.name == *n)) {
        return Err(CertError::InvalidSchema(format!(
            "undeclared field `{}`",
            prefix.child(unknown)
        )));
    }

    for field in fields {
        let path = prefix.child(&field.name);
        let value = record
            .get(&field.name)
            .ok_or_else(|| CertError::MissingField { path: path.clone() })?;
        if !value.conforms_to(&field.field_type) {
            return Err(CertError::InvalidSchema(format!(
                "field `{path}` expects {} but holds {}",
                field.field_type.name(),
                value.type_name()
            )));
        }
        match (&field.field_type, value) {
            (FieldType::Record(nested), Value::Record(inner)) => {
                encode_fields(inner, nested, &path, out)?;
            }
            _ => {
                let value = encode_leaf_value(value)?;
                out.push(Leaf { path, value });
            }
        }
    }
    Ok(())
}

/// Encode a single scalar value into its tagged leaf bytes.
///
/// # Errors
///
/// `CertError::InvalidSchema` for nested records, which never form a leaf.
pub fn encode_leaf_value(value: &Value) -> Result<Vec<u8>, CertError> {
    let bytes = match value {
        Value::String(s) => length_prefixed(TAG_STRING, s.as_bytes()),
        Value::Bytes(b) => length_prefixed(TAG_BYTES, b),
        Value::Integer(n) => {
            let mut out = Vec::with_capacity(9);
            out.push(TAG_INTEGER);
            out.extend_from_slice(&n.to_be_bytes());
            out
        }
        Value::Record(_) => {
            return Err(CertError::InvalidSchema(
                "a nested record is not a leaf value".to_string(),
            ))
        }
    };
    Ok(bytes)
}

fn length_prefixed(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + body.len());
    out.push(tag);
    out.extend_from_slice(&(body.len() as u64).to_be_bytes());
    out.extend_from_slice(body);
    out
}
