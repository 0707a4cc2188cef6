//! # Exposure Proofs
//!
//! An [`ExposureProof`] carries the plaintext of the disclosed fields, each
//! with its leaf index and inclusion path, plus the schema id, the leaf
//! count, and the root the proof was built against.
//!
//! ## Wire Format
//!
//! ```json
//! {
//!   "schemaId": "<64 hex>",
//!   "leafCount": 3,
//!   "disclosed": [
//!     {
//!       "path": ["name"],
//!       "value": {"type": "string", "value": "Unsplash"},
//!       "index": 0,
//!       "authPath": [{"hash": "<64 hex>", "side": "right"}]
//!     }
//!   ],
//!   "root": "<64 hex>"
//! }
//! ```
//!
//! [`ExposureProof::to_wire`] emits the JCS form of this document, so two
//! equal proofs always serialize to identical bytes.

use serde::{Deserialize, Serialize};

use xcert_core::{
    CanonicalBytes, CanonicalizationError, CertError, FieldPath, Imprint, SchemaId, Value,
};
use xcert_crypto::AuthStep;

/// One disclosed field with its inclusion path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedField {
    /// Full path of the field.
    pub path: FieldPath,
    /// Plaintext value.
    pub value: Value,
    /// Leaf position in schema order.
    pub index: usize,
    /// Sibling hashes from the leaf up to the root.
    pub auth_path: Vec<AuthStep>,
}

/// Selective disclosure of a certified record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureProof {
    /// Identifier of the schema the record was encoded under.
    pub schema_id: SchemaId,
    /// Number of leaves in the tree.
    pub leaf_count: usize,
    /// Disclosed fields, ordered by leaf index.
    pub disclosed: Vec<DisclosedField>,
    /// Root the proof was built against.
    pub root: Imprint,
}

impl ExposureProof {
    /// Deterministic JCS bytes of this proof.
    pub fn to_wire(&self) -> Result<CanonicalBytes, CertError> {
        Ok(CanonicalBytes::new(self)?)
    }

    /// Parse a proof from its JSON form.
    ///
    /// Parsing checks shape only; run the proof through
    /// [`crate::verify`] before trusting it.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, CertError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CertError::Canonicalization(CanonicalizationError::from(e)))
    }

    /// Disclosed value at `path`, if that field was disclosed.
    pub fn value(&self, path: &FieldPath) -> Option<&Value> {
        self.disclosed.iter().find(|f| &f.path == path).map(|f| &f.value)
    }

    /// Paths of every disclosed field, in leaf order.
    pub fn disclosed_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.disclosed.iter().map(|f| &f.path)
    }
}
