//! # Ledger Handle
//!
//! [`LedgerHandle`] is the one entry point for a ledger. It is cheap to
//! clone; every clone drives the same ledger.
//!
//! ## Lifecycle of a Mutating Call
//!
//! 1. Wait for the ledger's exclusive section (FIFO with other callers).
//! 2. Build the operation against the current state and stage it. Local
//!    errors (`CapabilityDenied`, `AssetNotFound`, `LedgerNotReady`, ...)
//!    return here, synchronously, before the provider is contacted.
//! 3. Register a pending [`Mutation`], spawn a driver task that owns the
//!    exclusive section, and hand the mutation back to the caller.
//! 4. The driver enables the provider if needed, submits, and settles the
//!    mutation from the provider's answer. Only then is the section
//!    released for the next caller.
//!
//! Because the driver, not the caller, owns the section and the provider
//! call, a caller that stops waiting cancels nothing.
//!
//! ## Completions
//!
//! The driver and [`LedgerHandle::apply_completion`] share one path. The
//! ledger remembers which mutations it applied, so a completion delivered
//! twice is applied once. A completion for a mutation the provider had
//! reported as timed out is still applied to the ledger; the mutation
//! itself stays `Failed`.
//!
//! An external completion enters the exclusive section like any other
//! change, so it never lands between another mutation's staging and its
//! application. The one exception is a completion for the mutation that
//! currently holds the section: it is applied straight away, since that
//! mutation's own driver is the only thing it could wait for.
//!
//! A creation that times out keeps its asset id reserved until its
//! completion arrives, so no later creation can take the id meanwhile.

use std::sync::Arc;

use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::Mutex;

use xcert_core::{AssetId, Imprint, LedgerAddress, MutationId, Owner, Record, Schema};
use xcert_state::{
    validate_recipe, Applied, AssetRecord, CapabilitySet, Ledger, LedgerError, LedgerInfo,
    LedgerOperation, LedgerRecipe, LedgerState, LedgerTransitionRecord, ProviderReceipt,
};

use crate::config::LedgerConfig;
use crate::mutation::{
    Mutation, MutationError, MutationFailure, MutationRecord, MutationRegistry, MutationResult,
    MutationStatus,
};
use crate::provider::{Provider, ProviderError};

struct Inner {
    ledger: RwLock<Ledger>,
    section: Arc<Mutex<()>>,
    /// The mutation whose driver holds `section`.
    in_flight: SyncMutex<Option<MutationId>>,
    registry: MutationRegistry,
    provider: Arc<dyn Provider>,
    config: LedgerConfig,
}

/// Shared handle on one ledger.
#[derive(Clone)]
pub struct LedgerHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("state", &self.state())
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl LedgerHandle {
    /// An undeployed ledger driven through `provider`.
    pub fn new(provider: Arc<dyn Provider>, config: LedgerConfig) -> Self {
        let registry = MutationRegistry::new(config.mutation_history);
        Self {
            inner: Arc::new(Inner {
                ledger: RwLock::new(Ledger::new()),
                section: Arc::new(Mutex::new(())),
                in_flight: SyncMutex::new(None),
                registry,
                provider,
                config,
            }),
        }
    }

    /// Create a ledger and submit its deployment in one step.
    pub async fn deploy_new(
        provider: Arc<dyn Provider>,
        config: LedgerConfig,
        recipe: &LedgerRecipe,
    ) -> Result<(Self, Mutation), LedgerError> {
        let handle = Self::new(provider, config);
        let mutation = handle.deploy(recipe).await?;
        Ok((handle, mutation))
    }

    // ── Mutating operations ─────────────────────────────────────────

    /// Validate `recipe` and deploy it.
    ///
    /// An invalid recipe fails here with `LedgerError::Recipe`; the
    /// provider is never contacted.
    pub async fn deploy(&self, recipe: &LedgerRecipe) -> Result<Mutation, LedgerError> {
        let info = validate_recipe(recipe).map_err(|e| {
            tracing::debug!(error = %e, "recipe refused");
            e
        })?;
        self.submit_with(move |_| Ok(LedgerOperation::Deploy { info })).await
    }

    /// Mint an asset for `owner` committed to `imprint`. With `id: None`
    /// the next free id is assigned.
    pub async fn create_asset(
        &self,
        owner: Owner,
        imprint: Imprint,
        id: Option<AssetId>,
    ) -> Result<Mutation, LedgerError> {
        self.submit_with(move |ledger| {
            Ok(LedgerOperation::CreateAsset {
                id: id.unwrap_or_else(|| ledger.next_asset_id()),
                owner,
                imprint,
            })
        })
        .await
    }

    /// Certify `record` under `schema` and mint it for `owner`.
    ///
    /// Fails with `LedgerError::InvalidSchema` if `schema` is not the
    /// ledger's schema, and with `LedgerError::Cert` if the record does not
    /// fit the schema.
    pub async fn certify_asset(
        &self,
        owner: Owner,
        record: &Record,
        schema: &Schema,
        id: Option<AssetId>,
    ) -> Result<Mutation, LedgerError> {
        let imprint = xcert_cert::imprint(record, schema)?;
        let schema_id = *schema.id();
        self.submit_with(move |ledger| {
            ledger.check_schema(&schema_id)?;
            Ok(LedgerOperation::CreateAsset {
                id: id.unwrap_or_else(|| ledger.next_asset_id()),
                owner,
                imprint,
            })
        })
        .await
    }

    /// Replace an asset's imprint. Requires `UPDATE_ASSET`.
    pub async fn update_asset(
        &self,
        id: AssetId,
        imprint: Imprint,
    ) -> Result<Mutation, LedgerError> {
        self.submit_with(move |_| Ok(LedgerOperation::UpdateAsset { id, imprint })).await
    }

    /// Remove an asset. Requires `DESTROY_ASSET`.
    pub async fn destroy_asset(&self, id: AssetId) -> Result<Mutation, LedgerError> {
        self.submit_with(move |_| Ok(LedgerOperation::DestroyAsset { id })).await
    }

    /// Flip transferability. Requires `TOGGLE_TRANSFERS`.
    pub async fn toggle_transfers(&self) -> Result<Mutation, LedgerError> {
        self.submit_with(|_| Ok(LedgerOperation::ToggleTransfers)).await
    }

    /// Reassign an asset to the revoked sentinel. Requires `REVOKE_ASSET`.
    pub async fn revoke_asset(&self, id: AssetId) -> Result<Mutation, LedgerError> {
        self.submit_with(move |_| Ok(LedgerOperation::RevokeAsset { id })).await
    }

    /// Move an asset to `to`. Requires transfers to be enabled.
    pub async fn transfer_asset(&self, id: AssetId, to: Owner) -> Result<Mutation, LedgerError> {
        self.submit_with(move |_| Ok(LedgerOperation::TransferAsset { id, to })).await
    }

    async fn submit_with<F>(&self, build: F) -> Result<Mutation, LedgerError>
    where
        F: FnOnce(&Ledger) -> Result<LedgerOperation, LedgerError> + Send,
    {
        let section = Arc::clone(&self.inner.section).lock_owned().await;

        let staged = {
            let mut ledger = self.inner.ledger.write();
            build(&*ledger).and_then(|op| ledger.stage(&op).map(|()| op))
        };
        let op = staged.map_err(|e| {
            tracing::debug!(error = %e, "ledger operation refused");
            e
        })?;

        let mutation = self.inner.registry.register(op.clone());
        tracing::info!(
            mutation_id = %mutation.id(),
            operation = %op.kind(),
            "mutation submitted"
        );

        let handle = self.clone();
        let id = mutation.id();
        *self.inner.in_flight.lock() = Some(id);
        tokio::spawn(async move {
            handle.drive(id, op).await;
            *handle.inner.in_flight.lock() = None;
            drop(section);
        });
        Ok(mutation)
    }

    async fn drive(&self, id: MutationId, op: LedgerOperation) {
        match self.run_remote(&op).await {
            Ok(receipt) => {
                // Divergence is logged and settled inside `complete`.
                let _ = self.complete(id, &op, &receipt);
            }
            Err(error) => self.fail(id, &op, &error),
        }
    }

    async fn run_remote(&self, op: &LedgerOperation) -> Result<ProviderReceipt, ProviderError> {
        let provider = &self.inner.provider;
        if !provider.is_enabled().await {
            if !self.inner.config.auto_enable_provider {
                return Err(ProviderError::NotEnabled);
            }
            tracing::info!("enabling provider");
            provider.enable().await?;
        }
        provider.submit(op).await
    }

    fn complete(
        &self,
        id: MutationId,
        op: &LedgerOperation,
        receipt: &ProviderReceipt,
    ) -> Result<Applied, LedgerError> {
        let outcome = {
            let mut ledger = self.inner.ledger.write();
            let outcome = ledger.apply(id, op, receipt);
            if outcome.is_err() && matches!(op, LedgerOperation::Deploy { .. }) {
                ledger.abort_deploy("deployment receipt could not be applied");
            }
            outcome
        };

        match outcome {
            Ok((Applied::Fresh, effect)) => {
                let result = MutationResult {
                    transaction_id: receipt.transaction_id.clone(),
                    effect,
                };
                if self.inner.registry.settle(id, MutationStatus::Completed(result)) {
                    tracing::info!(
                        mutation_id = %id,
                        operation = %op.kind(),
                        transaction_id = %receipt.transaction_id,
                        "mutation completed"
                    );
                } else {
                    tracing::warn!(
                        mutation_id = %id,
                        operation = %op.kind(),
                        "late completion applied to ledger; mutation stays failed"
                    );
                }
                Ok(Applied::Fresh)
            }
            Ok((Applied::Duplicate, _)) => {
                tracing::debug!(mutation_id = %id, "duplicate completion ignored");
                Ok(Applied::Duplicate)
            }
            Err(e) => {
                tracing::error!(
                    mutation_id = %id,
                    operation = %op.kind(),
                    error = %e,
                    "provider completed an operation the ledger cannot apply"
                );
                self.inner.registry.settle(
                    id,
                    MutationStatus::Failed(MutationFailure::StateDivergence(e.to_string())),
                );
                Err(e)
            }
        }
    }

    fn fail(&self, id: MutationId, op: &LedgerOperation, error: &ProviderError) {
        let failure = MutationFailure::from_provider(op.kind(), error);
        match (op, &failure) {
            (LedgerOperation::Deploy { .. }, _) => {
                self.inner.ledger.write().abort_deploy(&format!("deployment failed: {error}"));
            }
            (_, MutationFailure::MutationTimeout(_)) => {
                self.inner.ledger.write().hold_unconfirmed(id, op);
            }
            _ => {}
        }
        if self.inner.registry.settle(id, MutationStatus::Failed(failure)) {
            tracing::warn!(
                mutation_id = %id,
                operation = %op.kind(),
                error = %error,
                "provider failed mutation"
            );
        } else {
            tracing::debug!(mutation_id = %id, error = %error, "failure after settlement ignored");
        }
    }

    /// Deliver a provider completion for `id` from outside the driver,
    /// e.g. a confirmation callback.
    ///
    /// Applies at most once per mutation: a repeat delivery returns
    /// `Applied::Duplicate` and changes nothing. Waits for the exclusive
    /// section unless `id` is the mutation holding it.
    ///
    /// # Errors
    ///
    /// - `UnknownMutation` if `id` was never registered here or has been
    ///   evicted from history without being applied.
    /// - `UnexpectedCompletion` if the mutation already failed for a reason
    ///   other than a provider timeout.
    /// - Any ledger error if the state no longer admits the operation.
    pub async fn apply_completion(
        &self,
        id: MutationId,
        receipt: ProviderReceipt,
    ) -> Result<Applied, LedgerError> {
        {
            let in_flight = self.inner.in_flight.lock();
            if *in_flight == Some(id) {
                return self.reconcile(id, &receipt);
            }
        }
        let _section = Arc::clone(&self.inner.section).lock_owned().await;
        self.reconcile(id, &receipt)
    }

    fn reconcile(&self, id: MutationId, receipt: &ProviderReceipt) -> Result<Applied, LedgerError> {
        if self.inner.ledger.read().applied_effect(&id).is_some() {
            tracing::debug!(mutation_id = %id, "duplicate completion ignored");
            return Ok(Applied::Duplicate);
        }
        let op = self.inner.registry.operation(&id).ok_or(LedgerError::UnknownMutation(id))?;
        if let Some(MutationStatus::Failed(failure)) = self.inner.registry.status(&id) {
            if !matches!(failure, MutationFailure::MutationTimeout(_)) {
                return Err(LedgerError::UnexpectedCompletion {
                    mutation: id,
                    reason: failure.to_string(),
                });
            }
        }
        self.complete(id, &op, receipt)
    }

    // ── Mutation queries ────────────────────────────────────────────

    /// Status of a tracked mutation.
    pub fn mutation_status(&self, id: &MutationId) -> Option<MutationStatus> {
        self.inner.registry.status(id)
    }

    /// A fresh handle on a tracked mutation.
    pub fn mutation(&self, id: &MutationId) -> Option<Mutation> {
        self.inner.registry.handle(id)
    }

    /// Every tracked mutation, oldest first.
    pub fn mutations(&self) -> Vec<MutationRecord> {
        self.inner.registry.snapshot()
    }

    /// Await `mutation` bounded by the configured timeout.
    pub async fn await_mutation(
        &self,
        mutation: &Mutation,
    ) -> Result<MutationResult, MutationError> {
        mutation.await_completion_within(self.inner.config.await_timeout).await
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Number of assets held by `owner`.
    pub fn balance_of(&self, owner: &Owner) -> usize {
        self.inner.ledger.read().balance_of(owner)
    }

    /// Look up an asset.
    pub fn asset(&self, id: AssetId) -> Option<AssetRecord> {
        self.inner.ledger.read().asset(id).cloned()
    }

    /// Holder of an asset.
    pub fn owner_of(&self, id: AssetId) -> Option<Owner> {
        self.inner.ledger.read().owner_of(id).cloned()
    }

    /// Number of live assets.
    pub fn supply(&self) -> usize {
        self.inner.ledger.read().supply()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LedgerState {
        self.inner.ledger.read().state()
    }

    /// Recipe of the deployed ledger.
    pub fn info(&self) -> Option<LedgerInfo> {
        self.inner.ledger.read().info().cloned()
    }

    /// Address of the deployed ledger.
    pub fn address(&self) -> Option<LedgerAddress> {
        self.inner.ledger.read().address().cloned()
    }

    /// Granted capabilities.
    pub fn capabilities(&self) -> CapabilitySet {
        self.inner.ledger.read().capabilities()
    }

    /// Whether assets may currently change hands.
    pub fn is_transferable(&self) -> bool {
        self.inner.ledger.read().is_transferable()
    }

    /// State transition log.
    pub fn transitions(&self) -> Vec<LedgerTransitionRecord> {
        self.inner.ledger.read().transitions().to_vec()
    }

    /// A consistent copy of the whole ledger.
    pub fn snapshot(&self) -> Ledger {
        self.inner.ledger.read().clone()
    }

    /// The configuration this handle runs with.
    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }
}
