//! # Identifier Newtypes
//!
//! Type-level distinction between asset ids, owners, ledger addresses and
//! mutation ids. None of them can be passed where another is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;

/// Identifier of an asset within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl AssetId {
    /// The identifier following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset:{}", self.0)
    }
}

/// Opaque identity token of an asset holder, as issued by the provider.
///
/// One value is reserved: the revocation sentinel returned by
/// [`Owner::revoked()`]. [`Owner::new`] refuses it so no real holder can
/// be confused with a revoked asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

const REVOKED_OWNER: &str = "urn:xcert:revoked";

impl Owner {
    /// Wrap a holder identity.
    ///
    /// # Errors
    ///
    /// `IdentityError::Empty` for an empty token, `IdentityError::Reserved`
    /// for the revocation sentinel.
    pub fn new(token: impl Into<String>) -> Result<Self, IdentityError> {
        let token = token.into();
        if token == REVOKED_OWNER {
            return Err(IdentityError::Reserved(token));
        }
        Self::try_from(token)
    }

    /// The sentinel holder of revoked assets.
    pub fn revoked() -> Self {
        Self(REVOKED_OWNER.to_string())
    }

    /// Whether this is the revocation sentinel.
    pub fn is_revoked(&self) -> bool {
        self.0 == REVOKED_OWNER
    }

    /// The raw identity token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Owner {
    type Error = IdentityError;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        if token.trim().is_empty() {
            return Err(IdentityError::Empty("owner"));
        }
        Ok(Self(token))
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address at which the provider deployed a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerAddress(String);

impl LedgerAddress {
    /// Wrap a provider-issued address.
    pub fn new(address: impl Into<String>) -> Result<Self, IdentityError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(IdentityError::Empty("ledger address"));
        }
        Ok(Self(address))
    }

    /// The raw address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a submitted mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Generate a new random mutation identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutation:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_rejects_empty_and_sentinel() {
        assert_eq!(Owner::new("  "), Err(IdentityError::Empty("owner")));
        assert!(matches!(Owner::new(REVOKED_OWNER), Err(IdentityError::Reserved(_))));
        let alice = Owner::new("0xA11CE").unwrap();
        assert!(!alice.is_revoked());
        assert!(Owner::revoked().is_revoked());
    }

    #[test]
    fn revoked_owner_survives_serde() {
        let json = serde_json::to_string(&Owner::revoked()).unwrap();
        let back: Owner = serde_json::from_str(&json).unwrap();
        assert!(back.is_revoked());
        assert!(serde_json::from_str::<Owner>("\"\"").is_err());
    }

    #[test]
    fn asset_id_next_is_monotonic() {
        assert_eq!(AssetId(7).next(), AssetId(8));
        assert_eq!(AssetId(u64::MAX).next(), AssetId(u64::MAX));
    }

    #[test]
    fn mutation_ids_are_unique() {
        assert_ne!(MutationId::new(), MutationId::new());
        assert!(MutationId::new().to_string().starts_with("mutation:"));
    }

    #[test]
    fn ledger_address_rejects_empty() {
        assert!(LedgerAddress::new("").is_err());
        assert_eq!(LedgerAddress::new("0xLEDGER").unwrap().as_str(), "0xLEDGER");
    }
}
