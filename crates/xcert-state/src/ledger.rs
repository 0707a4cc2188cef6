//! # Ledger
//!
//! Holds a ledger's state and assets, decides whether an operation is
//! legal, and applies completed operations.
//!
//! ## Two-Phase Operations
//!
//! 1. [`Ledger::stage`] runs every local check (readiness, capability,
//!    asset lookup) against the current state. A deployment also moves the
//!    ledger to `Deploying`. Nothing else changes.
//! 2. [`Ledger::apply`] runs after the provider reports success. It
//!    re-checks the operation, mutates the state and remembers the
//!    mutation id with its effect. Applying the same mutation id again
//!    returns the remembered effect and changes nothing.
//!
//! Checks run in a fixed order: readiness, then capability, then asset
//! lookup. A read-only ledger asked to destroy a missing asset therefore
//! reports `CapabilityDenied`, not `AssetNotFound`.
//!
//! ## Asset Identifiers
//!
//! Ids are assigned from 1 upward or supplied by the caller. Either way the
//! next assigned id is always greater than every id ever created, and a
//! destroyed id is retired permanently.
//!
//! A creation whose outcome the provider could not confirm keeps its id
//! reserved ([`Ledger::hold_unconfirmed`]). No other creation may take the
//! id, and the reserving mutation can still be applied when its completion
//! turns up late.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use xcert_core::{
    AssetId, CertError, Imprint, LedgerAddress, MutationId, Owner, SchemaId, Timestamp,
};

use crate::capability::{Capability, CapabilitySet};
use crate::operation::{LedgerOperation, ProviderReceipt};
use crate::recipe::{LedgerInfo, RecipeError};

// ─── Ledger State ────────────────────────────────────────────────────

/// The lifecycle state of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerState {
    /// No deployment has been requested, or the last one failed.
    Uninitialized,
    /// A deployment is in flight.
    Deploying,
    /// Deployed, transfers enabled.
    Active,
    /// Deployed, transfers disabled.
    Frozen,
}

impl LedgerState {
    /// Whether lifecycle operations may run.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Active | Self::Frozen)
    }
}

impl std::fmt::Display for LedgerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Deploying => "DEPLOYING",
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a ledger operation was refused.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger was not granted the capability the operation needs.
    #[error("capability {capability} not granted to this ledger")]
    CapabilityDenied {
        /// The missing capability.
        capability: Capability,
    },

    /// The ledger is not deployed yet.
    #[error("ledger not ready: state is {state}")]
    LedgerNotReady {
        /// Current state.
        state: LedgerState,
    },

    /// No asset with this id exists.
    #[error("{0} not found")]
    AssetNotFound(AssetId),

    /// A deployment was requested for a ledger past `Uninitialized`.
    #[error("ledger already deployed or deploying: state is {state}")]
    AlreadyDeployed {
        /// Current state.
        state: LedgerState,
    },

    /// The id is in use or was retired by a destruction.
    #[error("{0} is in use or retired")]
    AssetIdUnavailable(AssetId),

    /// Transfers are disabled ledger-wide.
    #[error("transfers are disabled on this ledger")]
    TransfersDisabled,

    /// The asset is held by the revoked sentinel.
    #[error("{0} has been revoked")]
    AssetRevoked(AssetId),

    /// The revoked sentinel cannot receive assets directly.
    #[error("the revoked owner is reserved")]
    ReservedOwner,

    /// A record was certified under a schema other than the ledger's.
    #[error("invalid schema: ledger uses {expected}, record certified under {actual}")]
    InvalidSchema {
        /// The ledger's schema.
        expected: SchemaId,
        /// The schema offered.
        actual: SchemaId,
    },

    /// The deployment recipe did not validate.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Computing an imprint failed.
    #[error(transparent)]
    Cert(#[from] CertError),

    /// No mutation with this id is known.
    #[error("unknown {0}")]
    UnknownMutation(MutationId),

    /// A deployment receipt carried no ledger address.
    #[error("deployment receipt carries no ledger address")]
    MissingLedgerAddress,

    /// A completion arrived for a mutation that cannot accept one.
    #[error("unexpected completion for {mutation}: {reason}")]
    UnexpectedCompletion {
        /// The mutation.
        mutation: MutationId,
        /// Why the completion was refused.
        reason: String,
    },
}

// ─── Records ─────────────────────────────────────────────────────────

/// One asset held by a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Asset identifier.
    pub id: AssetId,
    /// Current holder.
    pub owner: Owner,
    /// Committed record fingerprint.
    pub imprint: Imprint,
}

/// Record of a ledger state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransitionRecord {
    /// State before the transition.
    pub from_state: LedgerState,
    /// State after the transition.
    pub to_state: LedgerState,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Reason for the transition.
    pub reason: String,
}

/// What applying an operation did. Also the result payload of a completed
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum LedgerEffect {
    /// The ledger is live at `address`.
    Deployed {
        /// Provider-issued address.
        address: LedgerAddress,
    },
    /// A new asset exists.
    AssetCreated {
        /// The asset as created.
        asset: AssetRecord,
    },
    /// An asset's imprint was replaced.
    AssetUpdated {
        /// The asset after the update.
        asset: AssetRecord,
        /// The replaced imprint.
        previous: Imprint,
    },
    /// An asset was removed.
    AssetDestroyed {
        /// The asset as it was.
        asset: AssetRecord,
    },
    /// Transferability was flipped.
    TransfersToggled {
        /// Whether transfers are now enabled.
        enabled: bool,
    },
    /// An asset was revoked.
    AssetRevoked {
        /// The asset after revocation.
        asset: AssetRecord,
        /// Its holder before revocation.
        previous_owner: Owner,
    },
    /// An asset changed hands.
    AssetTransferred {
        /// The asset after the transfer.
        asset: AssetRecord,
        /// Its holder before the transfer.
        from: Owner,
    },
}

/// Whether [`Ledger::apply`] changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First application: the state changed.
    Fresh,
    /// The mutation was already applied: nothing changed.
    Duplicate,
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// A capability-gated asset registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    state: LedgerState,
    info: Option<LedgerInfo>,
    address: Option<LedgerAddress>,
    transfers_enabled: bool,
    assets: BTreeMap<AssetId, AssetRecord>,
    retired: BTreeSet<AssetId>,
    next_asset_id: AssetId,
    unconfirmed: BTreeMap<AssetId, MutationId>,
    /// Every applied mutation with its effect. One entry per applied
    /// mutation for the ledger's lifetime; `apply` stays exactly-once after
    /// the mutation registry has forgotten a mutation.
    applied: HashMap<MutationId, LedgerEffect>,
    transitions: Vec<LedgerTransitionRecord>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// An undeployed ledger.
    pub fn new() -> Self {
        Self {
            state: LedgerState::Uninitialized,
            info: None,
            address: None,
            transfers_enabled: false,
            assets: BTreeMap::new(),
            retired: BTreeSet::new(),
            next_asset_id: AssetId(1),
            unconfirmed: BTreeMap::new(),
            applied: HashMap::new(),
            transitions: Vec::new(),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> LedgerState {
        self.state
    }

    /// Recipe of the deployed (or deploying) ledger.
    pub fn info(&self) -> Option<&LedgerInfo> {
        self.info.as_ref()
    }

    /// Address of the deployed ledger.
    pub fn address(&self) -> Option<&LedgerAddress> {
        self.address.as_ref()
    }

    /// Granted capabilities. Empty before deployment.
    pub fn capabilities(&self) -> CapabilitySet {
        self.info.as_ref().map(|i| i.capabilities.clone()).unwrap_or_default()
    }

    /// Whether assets may currently change hands.
    pub fn is_transferable(&self) -> bool {
        self.transfers_enabled
    }

    /// Number of live assets.
    pub fn supply(&self) -> usize {
        self.assets.len()
    }

    /// Look up an asset.
    pub fn asset(&self, id: AssetId) -> Option<&AssetRecord> {
        self.assets.get(&id)
    }

    /// Holder of an asset.
    pub fn owner_of(&self, id: AssetId) -> Option<&Owner> {
        self.assets.get(&id).map(|a| &a.owner)
    }

    /// Number of live assets held by `owner`.
    pub fn balance_of(&self, owner: &Owner) -> usize {
        self.assets.values().filter(|a| &a.owner == owner).count()
    }

    /// Live assets in id order.
    pub fn assets(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.values()
    }

    /// The id the next auto-assigned asset will get.
    pub fn next_asset_id(&self) -> AssetId {
        self.next_asset_id
    }

    /// Ordered log of state transitions.
    pub fn transitions(&self) -> &[LedgerTransitionRecord] {
        &self.transitions
    }

    /// Ids held for creations whose outcome is not yet known, with the
    /// mutation holding each.
    pub fn unconfirmed(&self) -> impl Iterator<Item = (&AssetId, &MutationId)> {
        self.unconfirmed.iter()
    }

    /// The effect recorded for `mutation`, if it was applied.
    ///
    /// Effects are kept for the ledger's lifetime, so a completion that
    /// arrives after the mutation left the bounded mutation history is
    /// still recognised as a duplicate.
    pub fn applied_effect(&self, mutation: &MutationId) -> Option<&LedgerEffect> {
        self.applied.get(mutation)
    }

    /// Check that `schema_id` is the one this ledger certifies under.
    pub fn check_schema(&self, schema_id: &SchemaId) -> Result<(), LedgerError> {
        let info = self.ready_info()?;
        if info.schema_id != *schema_id {
            return Err(LedgerError::InvalidSchema {
                expected: info.schema_id,
                actual: *schema_id,
            });
        }
        Ok(())
    }

    // ── Authorization ───────────────────────────────────────────────

    /// Run every local check for `op` against the current state.
    pub fn authorize(&self, op: &LedgerOperation) -> Result<(), LedgerError> {
        if let LedgerOperation::Deploy { .. } = op {
            if self.state != LedgerState::Uninitialized {
                return Err(LedgerError::AlreadyDeployed { state: self.state });
            }
            return Ok(());
        }

        let info = self.ready_info()?;
        if let Some(capability) = op.required_capability() {
            if !info.capabilities.contains(capability) {
                return Err(LedgerError::CapabilityDenied { capability });
            }
        }

        match op {
            LedgerOperation::CreateAsset { id, owner, .. } => {
                if owner.is_revoked() {
                    return Err(LedgerError::ReservedOwner);
                }
                if self.assets.contains_key(id)
                    || self.retired.contains(id)
                    || self.unconfirmed.contains_key(id)
                {
                    return Err(LedgerError::AssetIdUnavailable(*id));
                }
            }
            LedgerOperation::UpdateAsset { id, .. } | LedgerOperation::DestroyAsset { id } => {
                self.require_asset(*id)?;
            }
            LedgerOperation::RevokeAsset { id } => {
                if self.require_asset(*id)?.owner.is_revoked() {
                    return Err(LedgerError::AssetRevoked(*id));
                }
            }
            LedgerOperation::TransferAsset { id, to } => {
                if !self.transfers_enabled {
                    return Err(LedgerError::TransfersDisabled);
                }
                if self.require_asset(*id)?.owner.is_revoked() {
                    return Err(LedgerError::AssetRevoked(*id));
                }
                if to.is_revoked() {
                    return Err(LedgerError::ReservedOwner);
                }
            }
            LedgerOperation::Deploy { .. } | LedgerOperation::ToggleTransfers => {}
        }
        Ok(())
    }

    /// Authorize `op` ahead of submission. A deployment moves the ledger to
    /// `Deploying`; every other operation leaves the state untouched.
    pub fn stage(&mut self, op: &LedgerOperation) -> Result<(), LedgerError> {
        self.authorize(op)?;
        if let LedgerOperation::Deploy { info } = op {
            self.info = Some(info.clone());
            self.do_transition(LedgerState::Deploying, "deployment submitted");
        }
        Ok(())
    }

    /// Keep the id of an unconfirmed creation reserved for `mutation`.
    ///
    /// Called when the provider could not say whether `op` took effect.
    /// For a `CreateAsset` the id becomes unavailable to every other
    /// creation and auto-assignment moves past it; a later [`Ledger::apply`]
    /// of the same mutation consumes the reservation. Other operations
    /// reserve nothing: they re-check the state when applied.
    pub fn hold_unconfirmed(&mut self, mutation: MutationId, op: &LedgerOperation) {
        if let LedgerOperation::CreateAsset { id, .. } = op {
            if self.applied.contains_key(&mutation) {
                return;
            }
            self.unconfirmed.insert(*id, mutation);
            self.next_asset_id = self.next_asset_id.max(id.next());
        }
    }

    /// Return a `Deploying` ledger to `Uninitialized` after the provider
    /// failed the deployment. No effect in any other state.
    pub fn abort_deploy(&mut self, reason: &str) {
        if self.state == LedgerState::Deploying {
            self.info = None;
            self.do_transition(LedgerState::Uninitialized, reason);
        }
    }

    // ── Application ─────────────────────────────────────────────────

    /// Apply a completed operation.
    ///
    /// Idempotent per `mutation`: a second call with the same id returns
    /// `Applied::Duplicate` and the effect recorded the first time.
    ///
    /// # Errors
    ///
    /// The same errors as [`Ledger::authorize`] if the state no longer
    /// admits the operation, and `MissingLedgerAddress` for a deployment
    /// receipt without an address. The ledger is unchanged on error.
    pub fn apply(
        &mut self,
        mutation: MutationId,
        op: &LedgerOperation,
        receipt: &ProviderReceipt,
    ) -> Result<(Applied, LedgerEffect), LedgerError> {
        if let Some(effect) = self.applied.get(&mutation) {
            return Ok((Applied::Duplicate, effect.clone()));
        }

        let effect = match op {
            LedgerOperation::Deploy { info } => self.apply_deploy(info, receipt)?,
            other => {
                let reserved = self.take_reservation(mutation, other);
                match self.authorize(other).and_then(|()| self.apply_lifecycle(other)) {
                    Ok(effect) => effect,
                    Err(e) => {
                        if let Some(id) = reserved {
                            self.unconfirmed.insert(id, mutation);
                        }
                        return Err(e);
                    }
                }
            }
        };
        self.applied.insert(mutation, effect.clone());
        Ok((Applied::Fresh, effect))
    }

    fn apply_deploy(
        &mut self,
        info: &LedgerInfo,
        receipt: &ProviderReceipt,
    ) -> Result<LedgerEffect, LedgerError> {
        // A late completion may land after the deployment was aborted.
        if !matches!(self.state, LedgerState::Uninitialized | LedgerState::Deploying) {
            return Err(LedgerError::AlreadyDeployed { state: self.state });
        }
        let address = receipt.ledger_address.clone().ok_or(LedgerError::MissingLedgerAddress)?;
        self.info = Some(info.clone());
        self.address = Some(address.clone());
        self.transfers_enabled = true;
        self.do_transition(LedgerState::Active, &format!("deployed at {address}"));
        Ok(LedgerEffect::Deployed { address })
    }

    fn apply_lifecycle(&mut self, op: &LedgerOperation) -> Result<LedgerEffect, LedgerError> {
        let effect = match op {
            LedgerOperation::CreateAsset { id, owner, imprint } => {
                let asset = AssetRecord {
                    id: *id,
                    owner: owner.clone(),
                    imprint: *imprint,
                };
                self.assets.insert(*id, asset.clone());
                self.next_asset_id = self.next_asset_id.max(id.next());
                LedgerEffect::AssetCreated { asset }
            }
            LedgerOperation::UpdateAsset { id, imprint } => {
                let asset = self.require_asset_mut(*id)?;
                let previous = std::mem::replace(&mut asset.imprint, *imprint);
                LedgerEffect::AssetUpdated {
                    asset: asset.clone(),
                    previous,
                }
            }
            LedgerOperation::DestroyAsset { id } => {
                let asset = self.assets.remove(id).ok_or(LedgerError::AssetNotFound(*id))?;
                self.retired.insert(*id);
                LedgerEffect::AssetDestroyed { asset }
            }
            LedgerOperation::ToggleTransfers => {
                self.transfers_enabled = !self.transfers_enabled;
                let (to, reason) = if self.transfers_enabled {
                    (LedgerState::Active, "transfers enabled")
                } else {
                    (LedgerState::Frozen, "transfers disabled")
                };
                self.do_transition(to, reason);
                LedgerEffect::TransfersToggled {
                    enabled: self.transfers_enabled,
                }
            }
            LedgerOperation::RevokeAsset { id } => {
                let asset = self.require_asset_mut(*id)?;
                let previous_owner = std::mem::replace(&mut asset.owner, Owner::revoked());
                LedgerEffect::AssetRevoked {
                    asset: asset.clone(),
                    previous_owner,
                }
            }
            LedgerOperation::TransferAsset { id, to } => {
                let asset = self.require_asset_mut(*id)?;
                let from = std::mem::replace(&mut asset.owner, to.clone());
                LedgerEffect::AssetTransferred {
                    asset: asset.clone(),
                    from,
                }
            }
            LedgerOperation::Deploy { .. } => {
                return Err(LedgerError::AlreadyDeployed { state: self.state })
            }
        };
        Ok(effect)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn take_reservation(&mut self, mutation: MutationId, op: &LedgerOperation) -> Option<AssetId> {
        match op {
            LedgerOperation::CreateAsset { id, .. }
                if self.unconfirmed.get(id) == Some(&mutation) =>
            {
                self.unconfirmed.remove(id);
                Some(*id)
            }
            _ => None,
        }
    }

    fn ready_info(&self) -> Result<&LedgerInfo, LedgerError> {
        match (&self.info, self.state.is_ready()) {
            (Some(info), true) => Ok(info),
            _ => Err(LedgerError::LedgerNotReady { state: self.state }),
        }
    }

    fn require_asset(&self, id: AssetId) -> Result<&AssetRecord, LedgerError> {
        self.assets.get(&id).ok_or(LedgerError::AssetNotFound(id))
    }

    fn require_asset_mut(&mut self, id: AssetId) -> Result<&mut AssetRecord, LedgerError> {
        self.assets.get_mut(&id).ok_or(LedgerError::AssetNotFound(id))
    }

    fn do_transition(&mut self, to: LedgerState, reason: &str) {
        self.transitions.push(LedgerTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.state = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
