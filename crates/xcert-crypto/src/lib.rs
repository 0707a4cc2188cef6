//! # xcert-crypto: Hash Tree Primitives
//!
//! The MerkleHasher behind every imprint:
//!
//! - **Domain-separated SHA-256** for leaves (`0x00`) and interior nodes
//!   (`0x01`), so a leaf can never be replayed as a node. Leaves also
//!   commit to the schema id.
//! - **Binary hash tree** over encoded leaves, with per-leaf inclusion
//!   paths and a pure verification function.
//!
//! ## Crate Policy
//!
//! - Depends only on `xcert-core` internally.
//! - No mocking of hashing in tests; all tests use real SHA-256.
//! - Verification never panics or errors: it answers `true` or `false`.

pub mod merkle;
pub mod sha256;

pub use merkle::{expected_sides, verify_inclusion, AuthStep, MerkleTree, Side};
pub use sha256::{hash_leaf, leaf_hash, node_hash};
