//! # Capabilities
//!
//! A ledger's lifecycle permissions are chosen once, at deployment, from a
//! closed enumeration. [`CapabilitySet`] has no mutating methods: the only
//! way to obtain one is to build it whole.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::recipe::RecipeError;

/// A lifecycle permission grantable to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Replace an asset's imprint.
    UpdateAsset,
    /// Remove an asset for good.
    DestroyAsset,
    /// Enable or disable transfers ledger-wide.
    ToggleTransfers,
    /// Reassign an asset to the revoked sentinel owner.
    RevokeAsset,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 4] = [
        Self::UpdateAsset,
        Self::DestroyAsset,
        Self::ToggleTransfers,
        Self::RevokeAsset,
    ];

    /// The wire name (`UPDATE_ASSET`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateAsset => "UPDATE_ASSET",
            Self::DestroyAsset => "DESTROY_ASSET",
            Self::ToggleTransfers => "TOGGLE_TRANSFERS",
            Self::RevokeAsset => "REVOKE_ASSET",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = RecipeError;

    /// Parse a wire name. Matching is exact; `update_asset` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RecipeError::InvalidCapability(s.to_string()))
    }
}

/// An immutable set of capabilities. The empty set is a read-only ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a list of wire names, failing on the first unrecognized one.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RecipeError> {
        names.iter().map(|n| n.as_ref().parse::<Capability>()).collect()
    }

    /// Whether `capability` was granted.
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Granted capabilities in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Number of granted capabilities.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a read-only ledger.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{}\"", cap.as_str()));
        }
    }

    #[test]
    fn unknown_name_rejected() {
        assert_eq!(
            "MINT_ASSET".parse::<Capability>(),
            Err(RecipeError::InvalidCapability("MINT_ASSET".into()))
        );
        assert!("update_asset".parse::<Capability>().is_err());
    }

    #[test]
    fn from_names_dedupes_and_fails_fast() {
        let set = CapabilitySet::from_names(&["UPDATE_ASSET", "UPDATE_ASSET"]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(Capability::UpdateAsset));
        assert!(!set.contains(Capability::DestroyAsset));
        assert!(CapabilitySet::from_names(&["UPDATE_ASSET", "BOGUS"]).is_err());
    }

    #[test]
    fn empty_set_is_legal() {
        let set = CapabilitySet::from_names::<&str>(&[]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set, CapabilitySet::empty());
    }
}
