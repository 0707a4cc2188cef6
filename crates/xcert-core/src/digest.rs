//! # Digests, Imprints and Schema Identifiers
//!
//! Every hash value in xcert is 32 bytes of SHA-256 output. [`Digest`] is
//! the raw value (tree nodes, sibling hashes); [`Imprint`] is a Merkle root
//! committing to a whole record; [`SchemaId`] is the opaque identifier of a
//! schema. The three are distinct types so a sibling hash can never be
//! passed where an imprint is expected.
//!
//! ## Wire Format
//!
//! All three serialize as 64 lowercase hex characters. Parsing accepts
//! upper- or lowercase and rejects anything that does not decode to exactly
//! 32 bytes. A base64 form is available for transports that prefer it; both
//! round-trip byte-exact.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::DigestError;

/// Length in bytes of every xcert digest.
pub const DIGEST_LEN: usize = 32;

/// A raw 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex (case-insensitive, surrounding whitespace ignored).
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let raw = hex::decode(s.trim()).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        Self::from_slice(&raw)
    }

    /// Render as standard padded base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Parse from standard padded base64.
    pub fn from_base64(s: &str) -> Result<Self, DigestError> {
        let raw = BASE64
            .decode(s.trim())
            .map_err(|e| DigestError::InvalidBase64(e.to_string()))?;
        Self::from_slice(&raw)
    }

    fn from_slice(raw: &[u8]) -> Result<Self, DigestError> {
        let bytes: [u8; DIGEST_LEN] =
            raw.try_into().map_err(|_| DigestError::InvalidLength {
                expected: DIGEST_LEN,
                actual: raw.len(),
            })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute SHA-256 over a sequence of byte slices, fed in order.
pub fn sha256_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Digest(hasher.finalize().into())
}

/// Compute the SHA-256 digest of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> Digest {
    sha256_parts(&[data.as_bytes()])
}

/// The Merkle root committing to a record under a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Imprint(Digest);

impl Imprint {
    /// Wrap a tree root.
    pub const fn new(root: Digest) -> Self {
        Self(root)
    }

    /// The underlying root digest.
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        Digest::from_hex(s).map(Self)
    }

    /// Render as base64.
    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }

    /// Parse from base64.
    pub fn from_base64(s: &str) -> Result<Self, DigestError> {
        Digest::from_base64(s).map(Self)
    }
}

impl fmt::Display for Imprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "imprint:{}", self.0)
    }
}

/// Opaque identifier of a schema.
///
/// Supplied by the caller; xcert never recomputes it from a schema during
/// imprint or verification. [`SchemaId::derive`] exists for callers that
/// want a content-derived identifier for their own schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Digest);

impl SchemaId {
    /// Wrap an identifier digest.
    pub const fn new(id: Digest) -> Self {
        Self(id)
    }

    /// SHA-256 over the JCS form of an arbitrary schema descriptor.
    pub fn derive(descriptor: &impl Serialize) -> Result<Self, crate::CanonicalizationError> {
        let canonical = CanonicalBytes::new(descriptor)?;
        Ok(Self(sha256_digest(&canonical)))
    }

    /// The underlying digest.
    pub fn digest(&self) -> &Digest {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        Digest::from_hex(s).map(Self)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema:{}", self.0)
    }
}
