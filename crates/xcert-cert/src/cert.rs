//! # Imprint, Expose, Verify
//!
//! `imprint` runs the canonical encoder and builds the hash tree over its
//! leaves, each hashed together with the schema id; the root is the
//! imprint. `expose` rebuilds the same tree and
//! extracts the inclusion path of every requested leaf.
//!
//! ## Disclosure Rules
//!
//! - A scalar path discloses its own leaf.
//! - A nested record path discloses every scalar leaf beneath it.
//! - Requested paths are deduplicated; disclosed fields come out in leaf
//!   order regardless of request order.
//! - An empty request yields a proof with no disclosed fields. It verifies
//!   exactly when its root equals the expected imprint.
//!
//! ## Fail-Closed Verification
//!
//! Verification rejects the whole proof at the first inconsistency. There
//! is no partial success: one bad field invalidates the others. Leaf hashes
//! are recomputed under the proof's own schema id, so a proof carrying the
//! wrong schema id fails like any other tampered proof.

use std::collections::BTreeSet;

use xcert_core::{encode, encode_leaf_value, CertError, FieldPath, Imprint, Record, Schema};
use xcert_crypto::{expected_sides, leaf_hash, verify_inclusion, MerkleTree};

use crate::proof::{DisclosedField, ExposureProof};

/// Compute the imprint of `record` under `schema`.
///
/// # Errors
///
/// `CertError::MissingField` or `CertError::InvalidSchema` if the record
/// does not match the schema.
pub fn imprint(record: &Record, schema: &Schema) -> Result<Imprint, CertError> {
    let tree = build_tree(record, schema)?;
    Ok(Imprint::new(tree.root()))
}

/// Disclose the fields at `paths` together with their inclusion paths.
///
/// # Errors
///
/// Encoding errors as for [`imprint`], and `CertError::InvalidSchema` for a
/// path the schema does not declare.
pub fn expose(
    record: &Record,
    schema: &Schema,
    paths: &[FieldPath],
) -> Result<ExposureProof, CertError> {
    let tree = build_tree(record, schema)?;

    let mut indices = BTreeSet::new();
    for path in paths {
        let found = schema.leaf_indices(path);
        if found.is_empty() {
            return Err(CertError::InvalidSchema(format!("unknown field path `{path}`")));
        }
        indices.extend(found);
    }

    let mut disclosed = Vec::with_capacity(indices.len());
    for index in indices {
        let slot = &schema.layout()[index];
        let value = record
            .get_path(&slot.path)
            .cloned()
            .ok_or_else(|| CertError::MissingField {
                path: slot.path.clone(),
            })?;
        let auth_path = tree
            .prove(index)
            .map_err(|e| CertError::InvalidSchema(e.to_string()))?;
        disclosed.push(DisclosedField {
            path: slot.path.clone(),
            value,
            index,
            auth_path,
        });
    }

    Ok(ExposureProof {
        schema_id: *schema.id(),
        leaf_count: tree.leaf_count(),
        disclosed,
        root: Imprint::new(tree.root()),
    })
}

/// Whether `proof` is consistent with `expected`.
pub fn verify(proof: &ExposureProof, expected: &Imprint) -> bool {
    verify_detailed(proof, expected).is_ok()
}

/// Like [`verify`], reporting the first inconsistency found.
///
/// # Errors
///
/// `CertError::ProofVerificationFailed` naming what did not check out.
pub fn verify_detailed(proof: &ExposureProof, expected: &Imprint) -> Result<(), CertError> {
    if proof.root != *expected {
        return Err(failed("proof root does not match the expected imprint"));
    }
    if proof.leaf_count == 0 {
        return Err(failed("proof declares zero leaves"));
    }

    let mut seen = BTreeSet::new();
    for field in &proof.disclosed {
        if field.path.is_empty() {
            return Err(failed("disclosed field has an empty path"));
        }
        if !seen.insert(field.index) {
            return Err(failed(format!("leaf {} disclosed twice", field.index)));
        }
        let sides = expected_sides(field.index, proof.leaf_count).ok_or_else(|| {
            failed(format!(
                "leaf {} out of range for {} leaves",
                field.index, proof.leaf_count
            ))
        })?;
        if !field.auth_path.iter().map(|s| s.side).eq(sides) {
            return Err(failed(format!("malformed auth path for `{}`", field.path)));
        }
        let encoded = encode_leaf_value(&field.value)
            .map_err(|_| failed(format!("`{}` discloses a non-scalar value", field.path)))?;
        let hash = leaf_hash(&proof.schema_id, &field.path, &encoded);
        if !verify_inclusion(&hash, &field.auth_path, expected.digest()) {
            return Err(failed(format!("`{}` is not included in the imprint", field.path)));
        }
    }
    Ok(())
}

/// [`verify_detailed`] plus a check that the proof matches `schema`: same
/// schema id, same leaf count, and each disclosed field sits at its
/// declared index with a value of its declared type.
pub fn verify_with_schema(
    proof: &ExposureProof,
    expected: &Imprint,
    schema: &Schema,
) -> Result<(), CertError> {
    if proof.schema_id != *schema.id() {
        return Err(failed(format!(
            "proof is for {} but {} was expected",
            proof.schema_id,
            schema.id()
        )));
    }
    if proof.leaf_count != schema.leaf_count() {
        return Err(failed(format!(
            "proof declares {} leaves, schema has {}",
            proof.leaf_count,
            schema.leaf_count()
        )));
    }
    for field in &proof.disclosed {
        let slot = schema
            .layout()
            .get(field.index)
            .ok_or_else(|| failed(format!("leaf {} not in schema", field.index)))?;
        if slot.path != field.path {
            return Err(failed(format!(
                "leaf {} is `{}` in the schema, proof says `{}`",
                field.index, slot.path, field.path
            )));
        }
        if !field.value.conforms_to(&slot.field_type) {
            return Err(failed(format!(
                "`{}` expects {}, proof holds {}",
                field.path,
                slot.field_type.name(),
                field.value.type_name()
            )));
        }
    }
    verify_detailed(proof, expected)
}

fn build_tree(record: &Record, schema: &Schema) -> Result<MerkleTree, CertError> {
    let leaves = encode(record, schema)?;
    MerkleTree::from_leaves(schema.id(), &leaves)
        .map_err(|e| CertError::InvalidSchema(e.to_string()))
}

fn failed(reason: impl Into<String>) -> CertError {
    CertError::ProofVerificationFailed(reason.into())
}

/// A schema-bound certifier.
///
/// ```
/// use xcert_cert::{base_asset_record, base_asset_schema, Cert};
///
/// let cert = Cert::new(base_asset_schema().unwrap());
/// let record = base_asset_record("Unsplash", "A photo", vec![1, 2, 3, 4, 5], 1, 10);
/// let imprint = cert.imprint(&record).unwrap();
/// let proof = cert.expose(&record, &["name".into()]).unwrap();
/// assert!(cert.verify(&proof, &imprint));
/// ```
#[derive(Debug, Clone)]
pub struct Cert {
    schema: Schema,
}

impl Cert {
    /// Bind a schema.
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// The bound schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// [`imprint`] under the bound schema.
    pub fn imprint(&self, record: &Record) -> Result<Imprint, CertError> {
        imprint(record, &self.schema)
    }

    /// [`expose`] under the bound schema.
    pub fn expose(&self, record: &Record, paths: &[FieldPath]) -> Result<ExposureProof, CertError> {
        expose(record, &self.schema, paths)
    }

    /// [`verify_with_schema`] against the bound schema, as a boolean.
    pub fn verify(&self, proof: &ExposureProof, expected: &Imprint) -> bool {
        verify_with_schema(proof, expected, &self.schema).is_ok()
    }
}
