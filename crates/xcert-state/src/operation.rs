//! # Ledger Operations
//!
//! Every state-changing request a ledger hands to its provider. An
//! operation is fully resolved before submission (asset ids assigned,
//! imprints computed), so the provider receives exactly what will be
//! applied on completion.

use serde::{Deserialize, Serialize};

use xcert_core::{AssetId, Imprint, LedgerAddress, Owner};

use crate::capability::Capability;
use crate::recipe::LedgerInfo;

/// A ledger-mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerOperation {
    /// Deploy a ledger described by a validated recipe.
    Deploy {
        /// Validated recipe.
        info: LedgerInfo,
    },
    /// Mint a new asset.
    CreateAsset {
        /// Identifier of the new asset.
        id: AssetId,
        /// Initial holder.
        owner: Owner,
        /// Committed record fingerprint.
        imprint: Imprint,
    },
    /// Replace an asset's imprint.
    UpdateAsset {
        /// Target asset.
        id: AssetId,
        /// Replacement fingerprint.
        imprint: Imprint,
    },
    /// Remove an asset.
    DestroyAsset {
        /// Target asset.
        id: AssetId,
    },
    /// Flip ledger-wide transferability.
    ToggleTransfers,
    /// Reassign an asset to the revoked sentinel.
    RevokeAsset {
        /// Target asset.
        id: AssetId,
    },
    /// Move an asset to a new holder.
    TransferAsset {
        /// Target asset.
        id: AssetId,
        /// New holder.
        to: Owner,
    },
}

/// Discriminant of a [`LedgerOperation`], for logs and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deploy,
    CreateAsset,
    UpdateAsset,
    DestroyAsset,
    ToggleTransfers,
    RevokeAsset,
    TransferAsset,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deploy => "deploy",
            Self::CreateAsset => "create_asset",
            Self::UpdateAsset => "update_asset",
            Self::DestroyAsset => "destroy_asset",
            Self::ToggleTransfers => "toggle_transfers",
            Self::RevokeAsset => "revoke_asset",
            Self::TransferAsset => "transfer_asset",
        };
        f.write_str(s)
    }
}

impl LedgerOperation {
    /// The operation's discriminant.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Deploy { .. } => OperationKind::Deploy,
            Self::CreateAsset { .. } => OperationKind::CreateAsset,
            Self::UpdateAsset { .. } => OperationKind::UpdateAsset,
            Self::DestroyAsset { .. } => OperationKind::DestroyAsset,
            Self::ToggleTransfers => OperationKind::ToggleTransfers,
            Self::RevokeAsset { .. } => OperationKind::RevokeAsset,
            Self::TransferAsset { .. } => OperationKind::TransferAsset,
        }
    }

    /// The capability the ledger must hold, if the operation is gated.
    pub fn required_capability(&self) -> Option<Capability> {
        match self {
            Self::UpdateAsset { .. } => Some(Capability::UpdateAsset),
            Self::DestroyAsset { .. } => Some(Capability::DestroyAsset),
            Self::ToggleTransfers => Some(Capability::ToggleTransfers),
            Self::RevokeAsset { .. } => Some(Capability::RevokeAsset),
            Self::Deploy { .. } | Self::CreateAsset { .. } | Self::TransferAsset { .. } => None,
        }
    }

    /// The asset the operation targets, if any.
    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            Self::CreateAsset { id, .. }
            | Self::UpdateAsset { id, .. }
            | Self::DestroyAsset { id }
            | Self::RevokeAsset { id }
            | Self::TransferAsset { id, .. } => Some(*id),
            Self::Deploy { .. } | Self::ToggleTransfers => None,
        }
    }
}

/// What a provider reports when it has carried out an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReceipt {
    /// Provider-side transaction reference.
    pub transaction_id: String,
    /// Address of a newly deployed ledger. Required for deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_address: Option<LedgerAddress>,
}

impl ProviderReceipt {
    /// Receipt for an asset operation.
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ledger_address: None,
        }
    }

    /// Receipt for a deployment.
    pub fn deployed(transaction_id: impl Into<String>, address: LedgerAddress) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ledger_address: Some(address),
        }
    }
}
