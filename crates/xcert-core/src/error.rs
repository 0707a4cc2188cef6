//! # Error Types
//!
//! Errors shared across the xcert workspace. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Encoding errors (`InvalidSchema`, `MissingField`) name the offending
//!   field path so callers can fix the record without re-deriving it.
//! - Verification failures carry the first inconsistency found. The boolean
//!   `verify` entry points never surface them as errors.

use thiserror::Error;

use crate::schema::FieldPath;

/// Errors from schema construction, record encoding, and proof checking.
#[derive(Error, Debug)]
pub enum CertError {
    /// The schema is malformed, or a record or path does not fit it.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A field declared by the schema is absent from the record.
    #[error("missing field: {path}")]
    MissingField {
        /// Full path of the absent field.
        path: FieldPath,
    },

    /// An exposure proof is inconsistent with the expected imprint.
    #[error("proof verification failed: {0}")]
    ProofVerificationFailed(String),

    /// Producing canonical bytes for a descriptor or proof failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error during canonical (JCS) serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error decoding a digest from its wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// Decoded byte length is not 32.
    #[error("expected {expected} digest bytes, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Length actually decoded.
        actual: usize,
    },

    /// Input is not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Input is not valid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Error building Merkle trees or inclusion paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A tree needs at least one leaf.
    #[error("cannot build a hash tree over zero leaves")]
    EmptyTree,

    /// Requested leaf does not exist.
    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    LeafIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of leaves in the tree.
        leaf_count: usize,
    },
}

/// Error constructing an identifier newtype.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Identifier must not be empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Identifier collides with a reserved sentinel value.
    #[error("{0:?} is reserved")]
    Reserved(String),
}
