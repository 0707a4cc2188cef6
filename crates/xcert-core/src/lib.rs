//! # xcert-core: Foundational Types
//!
//! This crate is the leaf of the xcert dependency graph. It defines the
//! value types every other crate agrees on and the one algorithm that must
//! never drift between imprint time and verification time: the canonical
//! leaf encoding of a record under a schema.
//!
//! ## Key Design Principles
//!
//! 1. **Closed, schema-validated records.** A [`Record`] is only ever turned
//!    into bytes through [`encode()`], which checks it against a [`Schema`]
//!    first. Unknown fields, missing fields, and type mismatches are rejected
//!    at that single boundary.
//!
//! 2. **Fixed-length digests with a hex wire form.** [`Digest`], [`Imprint`]
//!    and [`SchemaId`] are 32-byte values that serialize as lowercase hex and
//!    round-trip byte-exact.
//!
//! 3. **Newtype identifiers.** `AssetId`, `Owner`, `LedgerAddress` and
//!    `MutationId` cannot be confused with one another.
//!
//! 4. **JCS wire bytes.** Structured artifacts that need a deterministic
//!    byte form (proof documents, schema descriptors) go through
//!    [`CanonicalBytes`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `xcert-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod record;
pub mod schema;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_parts, Digest, Imprint, SchemaId, DIGEST_LEN};
pub use encoding::{encode, encode_leaf_value, Leaf};
pub use error::{CanonicalizationError, CertError, CryptoError, DigestError, IdentityError};
pub use identity::{AssetId, LedgerAddress, MutationId, Owner};
pub use record::{Record, Value};
pub use schema::{FieldDescriptor, FieldPath, FieldType, LeafSlot, Schema};
pub use temporal::Timestamp;
