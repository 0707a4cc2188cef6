//! # Mutations
//!
//! A [`Mutation`] tracks one submitted operation. Its status moves once,
//! from `Pending` to `Completed` or `Failed`, and never again.
//!
//! The [`MutationRegistry`] owns the sending side of every mutation's
//! status channel. Settling goes through `watch::Sender::send_if_modified`
//! with a "still pending?" check, so of two racing settlements exactly one
//! takes effect and the other is reported as already settled.
//!
//! Handles hold only a receiver. Dropping one, or giving up on
//! [`Mutation::await_completion_within`], leaves the underlying operation
//! and its eventual outcome untouched.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use xcert_core::{MutationId, Timestamp};
use xcert_state::{LedgerEffect, LedgerOperation, OperationKind};

use crate::provider::ProviderError;

/// Payload of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    /// Provider transaction reference.
    pub transaction_id: String,
    /// What the ledger did.
    pub effect: LedgerEffect,
}

/// Why a mutation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum MutationFailure {
    /// The provider failed a deployment.
    #[error("deployment failed: {0}")]
    DeploymentFailed(String),

    /// The provider gave up waiting for confirmation.
    #[error("mutation timed out: {0}")]
    MutationTimeout(String),

    /// The provider failed a lifecycle operation.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The provider confirmed an operation the ledger could not apply.
    #[error("ledger state diverged from provider: {0}")]
    StateDivergence(String),
}

impl MutationFailure {
    /// Classify a provider error for an operation of kind `kind`.
    pub fn from_provider(kind: OperationKind, error: &ProviderError) -> Self {
        match error {
            ProviderError::Timeout(reason) => Self::MutationTimeout(reason.clone()),
            other if kind == OperationKind::Deploy => Self::DeploymentFailed(other.to_string()),
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// Status of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum MutationStatus {
    /// Submitted, no outcome yet.
    Pending,
    /// Carried out and applied.
    Completed(MutationResult),
    /// Did not take effect.
    Failed(MutationFailure),
}

impl MutationStatus {
    /// Whether the status is still `Pending`.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    fn outcome(&self) -> Option<Result<MutationResult, MutationError>> {
        match self {
            Self::Pending => None,
            Self::Completed(result) => Some(Ok(result.clone())),
            Self::Failed(failure) => Some(Err(MutationError::Failed(failure.clone()))),
        }
    }
}

/// Why awaiting a mutation did not yield a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The mutation settled as failed.
    #[error(transparent)]
    Failed(#[from] MutationFailure),

    /// The caller stopped waiting. The mutation itself is still pending.
    #[error("gave up after {0:?}; the mutation is still pending")]
    MutationTimeout(Duration),

    /// The registry went away before the mutation settled.
    #[error("mutation abandoned before it settled")]
    Abandoned,
}

/// Handle on a submitted operation.
#[derive(Debug, Clone)]
pub struct Mutation {
    id: MutationId,
    kind: OperationKind,
    status: watch::Receiver<MutationStatus>,
}

impl Mutation {
    /// The mutation's identifier.
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// What kind of operation it carries.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Current status, without waiting.
    pub fn poll(&self) -> MutationStatus {
        self.status.borrow().clone()
    }

    /// Wait until the mutation settles.
    pub async fn await_completion(&self) -> Result<MutationResult, MutationError> {
        let mut status = self.status.clone();
        let settled = status
            .wait_for(MutationStatus::is_terminal)
            .await
            .map_err(|_| MutationError::Abandoned)?
            .clone();
        settled.outcome().unwrap_or(Err(MutationError::Abandoned))
    }

    /// Wait at most `limit` for the mutation to settle.
    ///
    /// On timeout the mutation keeps running and will still settle; a
    /// later call can pick up its outcome.
    pub async fn await_completion_within(
        &self,
        limit: Duration,
    ) -> Result<MutationResult, MutationError> {
        tokio::time::timeout(limit, self.await_completion())
            .await
            .map_err(|_| MutationError::MutationTimeout(limit))?
    }
}

/// Listing entry for a tracked mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    /// Mutation identifier.
    pub id: MutationId,
    /// Operation kind.
    pub operation: OperationKind,
    /// When the mutation was registered.
    pub submitted_at: Timestamp,
    /// Current status.
    pub status: MutationStatus,
}

struct Entry {
    seq: u64,
    operation: LedgerOperation,
    submitted_at: Timestamp,
    status: watch::Sender<MutationStatus>,
}

#[derive(Default)]
struct Tracked {
    next_seq: u64,
    entries: HashMap<MutationId, Entry>,
    settled: VecDeque<MutationId>,
}

/// Registry of a ledger's mutations.
///
/// Keeps every pending mutation and the most recent `history` settled
/// ones. Synchronous: the lock is never held across an `.await`.
pub struct MutationRegistry {
    tracked: RwLock<Tracked>,
    history: usize,
}

impl std::fmt::Debug for MutationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracked = self.tracked.read();
        f.debug_struct("MutationRegistry")
            .field("tracked", &tracked.entries.len())
            .field("settled", &tracked.settled.len())
            .field("history", &self.history)
            .finish()
    }
}

impl MutationRegistry {
    /// An empty registry retaining `history` settled mutations.
    pub fn new(history: usize) -> Self {
        Self {
            tracked: RwLock::new(Tracked::default()),
            history,
        }
    }

    /// Track a new pending mutation for `operation`.
    pub fn register(&self, operation: LedgerOperation) -> Mutation {
        let id = MutationId::new();
        let kind = operation.kind();
        let (sender, receiver) = watch::channel(MutationStatus::Pending);
        let mut tracked = self.tracked.write();
        let seq = tracked.next_seq;
        tracked.next_seq += 1;
        tracked.entries.insert(
            id,
            Entry {
                seq,
                operation,
                submitted_at: Timestamp::now(),
                status: sender,
            },
        );
        Mutation {
            id,
            kind,
            status: receiver,
        }
    }

    /// Move a pending mutation to `status`.
    ///
    /// Returns `true` if this call settled it, `false` if it was already
    /// settled or is unknown.
    pub fn settle(&self, id: MutationId, status: MutationStatus) -> bool {
        let mut tracked = self.tracked.write();
        let Some(entry) = tracked.entries.get(&id) else {
            return false;
        };
        let changed = entry.status.send_if_modified(|current| {
            if !current.is_pending() {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            tracked.settled.push_back(id);
            while tracked.settled.len() > self.history {
                if let Some(evicted) = tracked.settled.pop_front() {
                    tracked.entries.remove(&evicted);
                }
            }
        }
        changed
    }

    /// Current status of a tracked mutation.
    pub fn status(&self, id: &MutationId) -> Option<MutationStatus> {
        self.tracked.read().entries.get(id).map(|e| e.status.borrow().clone())
    }

    /// The operation a tracked mutation carries.
    pub fn operation(&self, id: &MutationId) -> Option<LedgerOperation> {
        self.tracked.read().entries.get(id).map(|e| e.operation.clone())
    }

    /// A fresh handle on a tracked mutation.
    pub fn handle(&self, id: &MutationId) -> Option<Mutation> {
        self.tracked.read().entries.get(id).map(|e| Mutation {
            id: *id,
            kind: e.operation.kind(),
            status: e.status.subscribe(),
        })
    }

    /// Every tracked mutation, oldest first.
    pub fn snapshot(&self) -> Vec<MutationRecord> {
        let tracked = self.tracked.read();
        let mut entries: Vec<(&MutationId, &Entry)> = tracked.entries.iter().collect();
        entries.sort_by_key(|(_, e)| e.seq);
        entries
            .into_iter()
            .map(|(id, e)| MutationRecord {
                id: *id,
                operation: e.operation.kind(),
                submitted_at: e.submitted_at,
                status: e.status.borrow().clone(),
            })
            .collect()
    }

    /// Number of tracked mutations.
    pub fn len(&self) -> usize {
        self.tracked.read().entries.len()
    }

    /// True if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
