//! Lifecycle tests for `LedgerHandle` against the in-memory provider.

use std::sync::Arc;
use std::time::Duration;

use xcert_core::{AssetId, Digest, Imprint, Owner, SchemaId};
use xcert_ledger::{
    InMemoryProvider, LedgerConfig, LedgerHandle, MutationError, MutationFailure, MutationStatus,
    ProviderError,
};
use xcert_state::{
    Applied, Capability, LedgerEffect, LedgerError, LedgerOperation, LedgerRecipe, LedgerState,
    ProviderReceipt, RecipeError,
};

fn schema_id() -> SchemaId {
    SchemaId::new(Digest::from_bytes([0x5a; 32]))
}

fn imprint(n: u8) -> Imprint {
    Imprint::new(Digest::from_bytes([n; 32]))
}

fn owner(name: &str) -> Owner {
    Owner::new(name).unwrap()
}

fn recipe(capabilities: &[&str]) -> LedgerRecipe {
    capabilities.iter().fold(
        LedgerRecipe::new("Math Art", "MA", "https://example.com/assets/", &schema_id()),
        |recipe, name| recipe.with_capability(*name),
    )
}

fn all_capabilities() -> LedgerRecipe {
    recipe(&["UPDATE_ASSET", "DESTROY_ASSET", "TOGGLE_TRANSFERS", "REVOKE_ASSET"])
}

async fn deployed(provider: Arc<InMemoryProvider>, recipe: &LedgerRecipe) -> LedgerHandle {
    let (handle, mutation) =
        LedgerHandle::deploy_new(provider, LedgerConfig::default(), recipe).await.unwrap();
    mutation.await_completion().await.unwrap();
    handle
}

async fn mint(handle: &LedgerHandle, to: &str, n: u8) -> AssetId {
    let mutation = handle.create_asset(owner(to), imprint(n), None).await.unwrap();
    match mutation.await_completion().await.unwrap().effect {
        LedgerEffect::AssetCreated { asset } => asset.id,
        other => panic!("unexpected effect {other:?}"),
    }
}

// ── Deployment ──────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_activates_ledger() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = LedgerHandle::new(provider.clone(), LedgerConfig::default());
    assert_eq!(handle.state(), LedgerState::Uninitialized);

    let mutation = handle.deploy(&recipe(&["UPDATE_ASSET"])).await.unwrap();
    let result = mutation.await_completion().await.unwrap();

    assert_eq!(handle.state(), LedgerState::Active);
    let address = handle.address().unwrap();
    assert_eq!(result.effect, LedgerEffect::Deployed { address });
    assert!(handle.is_transferable());
    assert_eq!(handle.info().unwrap().schema_id, schema_id());
    assert!(handle.capabilities().contains(Capability::UpdateAsset));
    assert!(!handle.capabilities().contains(Capability::DestroyAsset));

    let states: Vec<_> = handle.transitions().iter().map(|t| t.to_state).collect();
    assert_eq!(states, vec![LedgerState::Deploying, LedgerState::Active]);
}

#[tokio::test]
async fn invalid_recipe_never_reaches_provider() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = LedgerHandle::new(provider.clone(), LedgerConfig::default());

    let err = handle.deploy(&recipe(&["MINT_EVERYTHING"])).await.unwrap_err();
    assert!(matches!(err, LedgerError::Recipe(RecipeError::InvalidCapability(_))));

    let mut bad = recipe(&[]);
    bad.schema_id = "not-hex".into();
    let err = handle.deploy(&bad).await.unwrap_err();
    assert!(matches!(err, LedgerError::Recipe(RecipeError::InvalidSchema(_))));

    assert!(provider.submitted().is_empty());
    assert_eq!(handle.state(), LedgerState::Uninitialized);
}

#[tokio::test]
async fn second_deploy_is_refused() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&[])).await;
    let err = handle.deploy(&recipe(&[])).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyDeployed { state: LedgerState::Active }));
    assert_eq!(provider.submitted().len(), 1);
}

#[tokio::test]
async fn failed_deploy_returns_to_uninitialized_and_can_retry() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.fail_next(ProviderError::Unavailable("network down".into()));
    let handle = LedgerHandle::new(provider.clone(), LedgerConfig::default());

    let mutation = handle.deploy(&recipe(&[])).await.unwrap();
    let err = mutation.await_completion().await.unwrap_err();
    assert!(matches!(err, MutationError::Failed(MutationFailure::DeploymentFailed(_))));
    assert_eq!(handle.state(), LedgerState::Uninitialized);
    assert!(handle.info().is_none());

    let retry = handle.deploy(&recipe(&[])).await.unwrap();
    retry.await_completion().await.unwrap();
    assert_eq!(handle.state(), LedgerState::Active);

    let states: Vec<_> = handle.transitions().iter().map(|t| t.to_state).collect();
    assert_eq!(
        states,
        vec![
            LedgerState::Deploying,
            LedgerState::Uninitialized,
            LedgerState::Deploying,
            LedgerState::Active,
        ]
    );
}

#[tokio::test]
async fn operations_before_deploy_are_not_ready() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = LedgerHandle::new(provider.clone(), LedgerConfig::default());
    let err = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::LedgerNotReady { state: LedgerState::Uninitialized }));
    assert!(provider.submitted().is_empty());
}

// ── Provider enablement ─────────────────────────────────────────────

#[tokio::test]
async fn disabled_provider_is_enabled_on_demand() {
    let provider = Arc::new(InMemoryProvider::disabled());
    let handle = deployed(provider.clone(), &recipe(&[])).await;
    assert_eq!(handle.state(), LedgerState::Active);
    assert_eq!(provider.enable_calls(), 1);

    mint(&handle, "alice", 1).await;
    assert_eq!(provider.enable_calls(), 1);
}

#[tokio::test]
async fn disabled_provider_without_auto_enable_fails_deploy() {
    let provider = Arc::new(InMemoryProvider::disabled());
    let config = LedgerConfig {
        auto_enable_provider: false,
        ..LedgerConfig::default()
    };
    let handle = LedgerHandle::new(provider.clone(), config);

    let mutation = handle.deploy(&recipe(&[])).await.unwrap();
    let err = mutation.await_completion().await.unwrap_err();
    assert!(matches!(err, MutationError::Failed(MutationFailure::DeploymentFailed(_))));
    assert_eq!(handle.state(), LedgerState::Uninitialized);
    assert_eq!(provider.enable_calls(), 0);
}

// ── Capabilities and local checks ───────────────────────────────────

#[tokio::test]
async fn update_only_ledger_refuses_other_gated_operations() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&["UPDATE_ASSET"])).await;
    let id = mint(&handle, "alice", 1).await;

    let update = handle.update_asset(id, imprint(2)).await.unwrap();
    update.await_completion().await.unwrap();
    assert_eq!(handle.asset(id).unwrap().imprint, imprint(2));

    let submitted_before = provider.submitted().len();
    for err in [
        handle.destroy_asset(id).await.unwrap_err(),
        handle.toggle_transfers().await.unwrap_err(),
        handle.revoke_asset(id).await.unwrap_err(),
    ] {
        assert!(matches!(err, LedgerError::CapabilityDenied { .. }), "{err}");
    }
    assert_eq!(provider.submitted().len(), submitted_before);
    assert_eq!(handle.supply(), 1);
}

#[tokio::test]
async fn capability_denial_precedes_asset_lookup() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &recipe(&[])).await;
    let err = handle.destroy_asset(AssetId(99)).await.unwrap_err();
    assert!(matches!(err, LedgerError::CapabilityDenied { capability: Capability::DestroyAsset }));
}

#[tokio::test]
async fn missing_asset_is_reported_locally() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &all_capabilities()).await;
    let err = handle.transfer_asset(AssetId(7), owner("bob")).await.unwrap_err();
    assert!(matches!(err, LedgerError::AssetNotFound(AssetId(7))));
    assert_eq!(provider.submitted().len(), 1);
}

#[tokio::test]
async fn explicit_ids_cannot_be_reused() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &all_capabilities()).await;

    let m = handle.create_asset(owner("alice"), imprint(1), Some(AssetId(10))).await.unwrap();
    m.await_completion().await.unwrap();
    let err = handle.create_asset(owner("bob"), imprint(2), Some(AssetId(10))).await.unwrap_err();
    assert!(matches!(err, LedgerError::AssetIdUnavailable(AssetId(10))));

    handle.destroy_asset(AssetId(10)).await.unwrap().await_completion().await.unwrap();
    assert_eq!(handle.supply(), 0);
    let err = handle.create_asset(owner("bob"), imprint(2), Some(AssetId(10))).await.unwrap_err();
    assert!(matches!(err, LedgerError::AssetIdUnavailable(AssetId(10))));

    assert_eq!(mint(&handle, "carol", 3).await, AssetId(11));
}

// ── Transfers and revocation ────────────────────────────────────────

#[tokio::test]
async fn frozen_ledger_refuses_transfers_until_unfrozen() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &all_capabilities()).await;
    let id = mint(&handle, "alice", 1).await;

    handle.toggle_transfers().await.unwrap().await_completion().await.unwrap();
    assert_eq!(handle.state(), LedgerState::Frozen);
    assert!(!handle.is_transferable());
    let err = handle.transfer_asset(id, owner("bob")).await.unwrap_err();
    assert!(matches!(err, LedgerError::TransfersDisabled));

    // Frozen ledgers still accept non-transfer operations.
    handle.update_asset(id, imprint(9)).await.unwrap().await_completion().await.unwrap();

    handle.toggle_transfers().await.unwrap().await_completion().await.unwrap();
    assert_eq!(handle.state(), LedgerState::Active);
    let result = handle
        .transfer_asset(id, owner("bob"))
        .await
        .unwrap()
        .await_completion()
        .await
        .unwrap();
    assert!(matches!(
        result.effect,
        LedgerEffect::AssetTransferred { ref from, .. } if *from == owner("alice")
    ));
    assert_eq!(handle.owner_of(id), Some(owner("bob")));
    assert_eq!(handle.balance_of(&owner("alice")), 0);
    assert_eq!(handle.balance_of(&owner("bob")), 1);
}

#[tokio::test]
async fn revoked_assets_are_stuck() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &all_capabilities()).await;
    let id = mint(&handle, "alice", 1).await;

    handle.revoke_asset(id).await.unwrap().await_completion().await.unwrap();
    assert!(handle.owner_of(id).unwrap().is_revoked());
    assert_eq!(handle.balance_of(&owner("alice")), 0);
    assert_eq!(handle.supply(), 1);

    let err = handle.transfer_asset(id, owner("bob")).await.unwrap_err();
    assert!(matches!(err, LedgerError::AssetRevoked(revoked) if revoked == id));
    let err = handle.revoke_asset(id).await.unwrap_err();
    assert!(matches!(err, LedgerError::AssetRevoked(revoked) if revoked == id));

    let err = handle.create_asset(Owner::revoked(), imprint(2), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::ReservedOwner));
}

// ── Awaiting and completions ────────────────────────────────────────

#[tokio::test]
async fn caller_timeout_leaves_mutation_running() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&[])).await;

    provider.hold();
    let mutation = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    let err = mutation.await_completion_within(Duration::from_millis(20)).await.unwrap_err();
    assert_eq!(err, MutationError::MutationTimeout(Duration::from_millis(20)));
    assert_eq!(mutation.poll(), MutationStatus::Pending);
    assert_eq!(handle.supply(), 0);

    provider.release();
    let result = mutation.await_completion().await.unwrap();
    assert!(matches!(result.effect, LedgerEffect::AssetCreated { .. }));
    assert_eq!(handle.supply(), 1);
    assert!(handle.mutation_status(&mutation.id()).unwrap().is_terminal());
}

#[tokio::test]
async fn await_mutation_uses_configured_bound() {
    let provider = Arc::new(InMemoryProvider::new());
    let (handle, deploy) = LedgerHandle::deploy_new(
        provider.clone(),
        LedgerConfig {
            await_timeout: Duration::from_millis(10),
            ..LedgerConfig::default()
        },
        &recipe(&[]),
    )
    .await
    .unwrap();
    handle.await_mutation(&deploy).await.unwrap();

    provider.hold();
    let mutation = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    assert!(matches!(
        handle.await_mutation(&mutation).await,
        Err(MutationError::MutationTimeout(_))
    ));
    provider.release();
    mutation.await_completion().await.unwrap();
}

#[tokio::test]
async fn external_completion_is_applied_once() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &all_capabilities()).await;

    provider.hold();
    let mutation = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    let receipt = ProviderReceipt::new("0xexternal");
    let first = handle.apply_completion(mutation.id(), receipt.clone()).await.unwrap();
    let second = handle.apply_completion(mutation.id(), receipt).await.unwrap();
    assert_eq!((first, second), (Applied::Fresh, Applied::Duplicate));

    let result = mutation.await_completion().await.unwrap();
    assert_eq!(result.transaction_id, "0xexternal");
    assert_eq!(handle.supply(), 1);

    // The driver's own completion arrives after release and is ignored.
    provider.release();
    handle.toggle_transfers().await.unwrap().await_completion().await.unwrap();
    assert_eq!(handle.supply(), 1);
    match handle.mutation_status(&mutation.id()).unwrap() {
        MutationStatus::Completed(result) => assert_eq!(result.transaction_id, "0xexternal"),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn provider_timeout_can_be_reconciled_later() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&[])).await;

    provider.fail_next(ProviderError::Timeout("no confirmation after 12 blocks".into()));
    let mutation = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    let err = mutation.await_completion().await.unwrap_err();
    assert!(matches!(err, MutationError::Failed(MutationFailure::MutationTimeout(_))));
    assert_eq!(handle.supply(), 0);

    let applied =
        handle.apply_completion(mutation.id(), ProviderReceipt::new("0xlate")).await.unwrap();
    assert_eq!(applied, Applied::Fresh);
    assert_eq!(handle.supply(), 1);
    assert!(matches!(
        handle.mutation_status(&mutation.id()),
        Some(MutationStatus::Failed(MutationFailure::MutationTimeout(_)))
    ));
}

#[tokio::test]
async fn late_completion_waits_for_the_mutation_in_flight() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &all_capabilities()).await;
    let id = mint(&handle, "alice", 1).await;

    provider.fail_next(ProviderError::Timeout("no confirmation".into()));
    let destroy = handle.destroy_asset(id).await.unwrap();
    assert!(matches!(
        destroy.await_completion().await,
        Err(MutationError::Failed(MutationFailure::MutationTimeout(_)))
    ));

    provider.hold();
    let update = handle.update_asset(id, imprint(2)).await.unwrap();
    let late = tokio::spawn({
        let handle = handle.clone();
        let destroy_id = destroy.id();
        async move { handle.apply_completion(destroy_id, ProviderReceipt::new("0xlate")).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!late.is_finished());
    assert_eq!(handle.supply(), 1);

    provider.release();
    let updated = update.await_completion().await.unwrap();
    assert!(matches!(updated.effect, LedgerEffect::AssetUpdated { .. }));
    assert_eq!(late.await.unwrap().unwrap(), Applied::Fresh);
    assert_eq!(handle.supply(), 0);
}

#[tokio::test]
async fn timed_out_creation_keeps_its_id() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&[])).await;

    provider.fail_next(ProviderError::Timeout("no confirmation".into()));
    let first = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    assert!(first.await_completion().await.is_err());
    assert_eq!(handle.supply(), 0);

    assert_eq!(mint(&handle, "bob", 2).await, AssetId(2));
    let taken = handle.create_asset(owner("carol"), imprint(3), Some(AssetId(1))).await;
    assert!(matches!(taken, Err(LedgerError::AssetIdUnavailable(AssetId(1)))));

    let applied =
        handle.apply_completion(first.id(), ProviderReceipt::new("0xlate")).await.unwrap();
    assert_eq!(applied, Applied::Fresh);
    assert_eq!(handle.owner_of(AssetId(1)), Some(owner("alice")));
    assert_eq!(handle.owner_of(AssetId(2)), Some(owner("bob")));
    assert_eq!(handle.supply(), 2);
}

#[tokio::test]
async fn applied_mutations_stay_duplicates_after_eviction() {
    let provider = Arc::new(InMemoryProvider::new());
    let config = LedgerConfig { mutation_history: 1, ..LedgerConfig::default() };
    let (handle, deploy) = LedgerHandle::deploy_new(provider, config, &recipe(&[])).await.unwrap();
    deploy.await_completion().await.unwrap();

    let first = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    first.await_completion().await.unwrap();
    mint(&handle, "bob", 2).await;
    assert!(handle.mutation_status(&first.id()).is_none());

    let again = handle.apply_completion(first.id(), ProviderReceipt::new("0xagain")).await;
    assert_eq!(again.unwrap(), Applied::Duplicate);
    assert_eq!(handle.supply(), 2);
}

#[tokio::test]
async fn completion_after_rejection_is_unexpected() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &recipe(&[])).await;

    provider.fail_next(ProviderError::Rejected("execution reverted".into()));
    let mutation = handle.create_asset(owner("alice"), imprint(1), None).await.unwrap();
    let err = mutation.await_completion().await.unwrap_err();
    assert!(matches!(err, MutationError::Failed(MutationFailure::Rejected(_))));

    let err =
        handle.apply_completion(mutation.id(), ProviderReceipt::new("0xlate")).await.unwrap_err();
    assert!(matches!(err, LedgerError::UnexpectedCompletion { .. }));
    assert_eq!(handle.supply(), 0);
}

#[tokio::test]
async fn completion_for_unknown_mutation_is_refused() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &recipe(&[])).await;
    let id = xcert_core::MutationId::new();
    let err = handle.apply_completion(id, ProviderReceipt::new("0x1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::UnknownMutation(unknown) if unknown == id));
}

#[tokio::test]
async fn mutations_are_listed_in_submission_order() -> anyhow::Result<()> {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider, &all_capabilities()).await;
    let id = mint(&handle, "alice", 1).await;
    handle.update_asset(id, imprint(2)).await?.await_completion().await?;

    let kinds: Vec<String> = handle
        .mutations()
        .iter()
        .map(|record| record.operation.to_string())
        .collect();
    assert_eq!(kinds, vec!["deploy", "create_asset", "update_asset"]);
    assert!(handle.mutations().iter().all(|record| record.status.is_terminal()));

    let json = serde_json::to_value(handle.mutations())?;
    assert_eq!(json[2]["status"]["status"], "completed");
    Ok(())
}

// ── Serialization of mutating operations ────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_overlap_at_the_provider() {
    let provider = Arc::new(InMemoryProvider::new().with_latency(Duration::from_millis(5)));
    let handle = deployed(provider.clone(), &all_capabilities()).await;

    let tasks: Vec<_> = (0..12u8)
        .map(|n| {
            let handle = handle.clone();
            tokio::spawn(async move {
                let holder = owner(&format!("owner-{n}"));
                let mutation = handle.create_asset(holder, imprint(n), None).await.unwrap();
                mutation.await_completion().await.unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        match task.await.unwrap().effect {
            LedgerEffect::AssetCreated { asset } => ids.push(asset.id),
            other => panic!("unexpected effect {other:?}"),
        }
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 12);
    assert_eq!(handle.supply(), 12);
    assert_eq!(provider.max_in_flight(), 1);
    assert_eq!(
        provider
            .submitted()
            .iter()
            .filter(|op| matches!(op, LedgerOperation::CreateAsset { .. }))
            .count(),
        12
    );
}

#[tokio::test]
async fn reads_do_not_wait_for_pending_mutation() {
    let provider = Arc::new(InMemoryProvider::new());
    let handle = deployed(provider.clone(), &all_capabilities()).await;
    let id = mint(&handle, "alice", 1).await;

    provider.hold();
    let pending = handle.transfer_asset(id, owner("bob")).await.unwrap();
    assert_eq!(handle.owner_of(id), Some(owner("alice")));
    assert_eq!(handle.snapshot().supply(), 1);
    assert!(pending.poll().is_pending());

    // A second mutating call queues behind the first.
    let queued = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.update_asset(id, imprint(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!queued.is_finished());

    provider.release();
    pending.await_completion().await.unwrap();
    queued.await.unwrap().unwrap().await_completion().await.unwrap();
    assert_eq!(handle.owner_of(id), Some(owner("bob")));
    assert_eq!(handle.asset(id).unwrap().imprint, imprint(5));
}
