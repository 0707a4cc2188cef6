//! # Domain-Separated SHA-256
//!
//! - Leaf: `SHA256(0x00 || schema_id || path_bytes || encoded_value)`
//! - Node: `SHA256(0x01 || left || right)`
//!
//! `path_bytes` is [`FieldPath::to_bytes`], which length-prefixes every
//! segment, so the concatenation with the value is unambiguous. The schema
//! id is fixed-width. Every leaf is bound to the schema it was encoded
//! under, so a proof relabelled with another schema id no longer
//! recomputes the root.

use sha2::{Digest as _, Sha256};

use xcert_core::{Digest, FieldPath, Leaf, SchemaId};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash one encoded leaf of a record certified under `schema_id`.
pub fn leaf_hash(schema_id: &SchemaId, path: &FieldPath, value: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(schema_id.digest().as_bytes());
    hasher.update(path.to_bytes());
    hasher.update(value);
    Digest::from_bytes(hasher.finalize().into())
}

/// Hash a [`Leaf`] produced by the canonical encoder.
pub fn hash_leaf(schema_id: &SchemaId, leaf: &Leaf) -> Digest {
    leaf_hash(schema_id, &leaf.path, &leaf.value)
}

/// Hash two children into their parent. `left` is the lower-index child.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::from_bytes(hasher.finalize().into())
}
