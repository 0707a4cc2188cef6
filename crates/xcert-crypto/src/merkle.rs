//! # Binary Hash Tree
//!
//! Builds the tree an imprint is the root of, produces the sibling path
//! for any leaf, and checks such paths against a claimed root.
//!
//! ## Shape
//!
//! Level 0 holds the leaf hashes in encoder order. Each next level pairs
//! neighbours left to right (`node_hash(level[2i], level[2i + 1])`). When a
//! level has an odd number of nodes the last one is promoted to the next
//! level unchanged: it is neither duplicated nor hashed alone. A promoted
//! node therefore has no sibling at that level, and its inclusion path
//! simply omits a step there.
//!
//! A single-leaf tree has the leaf hash as its root and an empty path.
//!
//! ## Verification
//!
//! [`verify_inclusion`] folds a leaf hash up its path and compares the
//! result with the claimed root byte for byte. It has no failure mode other
//! than returning `false`.

use serde::{Deserialize, Serialize};

use xcert_core::{CryptoError, Digest, Leaf, SchemaId};

use crate::sha256::{hash_leaf, node_hash};

/// Position of a sibling relative to the node on the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The sibling has the lower index; it is hashed first.
    Left,
    /// The sibling has the higher index; it is hashed second.
    Right,
}

/// One step of an inclusion path: a sibling hash and its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStep {
    /// Hash of the sibling subtree.
    pub hash: Digest,
    /// Which side the sibling sits on.
    pub side: Side,
}

/// A fully materialized hash tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree over precomputed leaf hashes.
    ///
    /// # Errors
    ///
    /// `CryptoError::EmptyTree` if `leaf_hashes` is empty.
    pub fn build(leaf_hashes: Vec<Digest>) -> Result<Self, CryptoError> {
        if leaf_hashes.is_empty() {
            return Err(CryptoError::EmptyTree);
        }
        let mut levels = vec![leaf_hashes];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next = level
                .chunks(2)
                .filter_map(|pair| match pair {
                    [left, right] => Some(node_hash(left, right)),
                    [lone] => Some(*lone),
                    _ => None,
                })
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Build a tree over encoder output for a record under `schema_id`.
    pub fn from_leaves(schema_id: &SchemaId, leaves: &[Leaf]) -> Result<Self, CryptoError> {
        Self::build(leaves.iter().map(|leaf| hash_leaf(schema_id, leaf)).collect())
    }

    /// The root hash.
    pub fn root(&self) -> Digest {
        // `build` guarantees a non-empty top level.
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(|| Digest::from_bytes([0; 32]))
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Hash of the leaf at `index`, if it exists.
    pub fn leaf_hash(&self, index: usize) -> Option<Digest> {
        self.levels.first().and_then(|l| l.get(index)).copied()
    }

    /// The inclusion path for the leaf at `index`, bottom-up.
    ///
    /// # Errors
    ///
    /// `CryptoError::LeafIndexOutOfRange` if there is no such leaf.
    pub fn prove(&self, index: usize) -> Result<Vec<AuthStep>, CryptoError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(CryptoError::LeafIndexOutOfRange { index, leaf_count });
        }
        let mut path = Vec::new();
        let mut pos = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = pos ^ 1;
            if let Some(hash) = level.get(sibling) {
                let side = if sibling < pos { Side::Left } else { Side::Right };
                path.push(AuthStep { hash: *hash, side });
            }
            pos /= 2;
        }
        Ok(path)
    }
}

/// Recompute the root from `leaf_hash` and `path` and compare it with
/// `claimed_root`.
pub fn verify_inclusion(leaf_hash: &Digest, path: &[AuthStep], claimed_root: &Digest) -> bool {
    let computed = path.iter().fold(*leaf_hash, |acc, step| match step.side {
        Side::Left => node_hash(&step.hash, &acc),
        Side::Right => node_hash(&acc, &step.hash),
    });
    computed == *claimed_root
}

/// The sequence of sides a correct path for leaf `index` in a tree of
/// `leaf_count` leaves must have. `None` if the leaf cannot exist.
///
/// Used to reject paths that hash to the right root but do not describe
/// the claimed position.
pub fn expected_sides(index: usize, leaf_count: usize) -> Option<Vec<Side>> {
    if index >= leaf_count {
        return None;
    }
    let mut sides = Vec::new();
    let mut pos = index;
    let mut width = leaf_count;
    while width > 1 {
        let sibling = pos ^ 1;
        if sibling < width {
            sides.push(if sibling < pos { Side::Left } else { Side::Right });
        }
        pos /= 2;
        width = width.div_ceil(2);
    }
    Some(sides)
}
