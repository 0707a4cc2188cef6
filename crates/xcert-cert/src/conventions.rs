//! # Asset Schema Conventions
//!
//! The base asset convention describes a collectible: a name, a free-text
//! description, the image payload, and its edition out of a total count.
//! Its schema id is derived from the field declaration, so every party
//! using the convention agrees on it without coordination.

use xcert_core::{CertError, FieldDescriptor, Record, Schema};

/// The base asset schema:
/// `[name: string, description: string, image: bytes, edition: integer,
/// totalCount: integer]`.
pub fn base_asset_schema() -> Result<Schema, CertError> {
    Schema::with_derived_id(vec![
        FieldDescriptor::string("name"),
        FieldDescriptor::string("description"),
        FieldDescriptor::bytes("image"),
        FieldDescriptor::integer("edition"),
        FieldDescriptor::integer("totalCount"),
    ])
}

/// A record conforming to [`base_asset_schema`].
pub fn base_asset_record(
    name: &str,
    description: &str,
    image: Vec<u8>,
    edition: i64,
    total_count: i64,
) -> Record {
    Record::new()
        .with("name", name)
        .with("description", description)
        .with("image", image)
        .with("edition", edition)
        .with("totalCount", total_count)
}
