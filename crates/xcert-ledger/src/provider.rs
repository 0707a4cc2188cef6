//! # Provider Boundary
//!
//! The provider is whatever actually executes ledger operations: a wallet
//! plus a remote network in production, [`InMemoryProvider`] elsewhere.
//! The ledger never inspects how it works; it only awaits the receipt.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

use xcert_core::LedgerAddress;
use xcert_state::{LedgerOperation, ProviderReceipt};

/// Errors reported by a provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has not been enabled.
    #[error("provider is not enabled")]
    NotEnabled,

    /// The provider refused or reverted the operation.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The provider gave up waiting for confirmation.
    #[error("confirmation timed out: {0}")]
    Timeout(String),

    /// The provider could not be reached.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// External executor of ledger operations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Whether the provider is ready to accept submissions.
    async fn is_enabled(&self) -> bool;

    /// Ask the provider to become ready (e.g. unlock a wallet).
    async fn enable(&self) -> Result<(), ProviderError>;

    /// Carry out `operation` and report its receipt once confirmed.
    async fn submit(&self, operation: &LedgerOperation) -> Result<ProviderReceipt, ProviderError>;
}

/// In-memory provider for development and testing.
///
/// Confirms every operation after a configurable latency, with
/// deterministic transaction ids (`0x0000000000000001`, ...) and ledger
/// addresses. Failures can be scripted, and submissions can be held at
/// the gate to simulate a provider that has not answered yet.
///
/// ## Warning
///
/// Nothing is persisted or executed anywhere. Suitable only for
/// development and tests.
#[derive(Debug)]
pub struct InMemoryProvider {
    enabled: AtomicBool,
    latency: Duration,
    gate: watch::Sender<bool>,
    failures: Mutex<VecDeque<ProviderError>>,
    submitted: Mutex<Vec<LedgerOperation>>,
    next_tx: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    enable_calls: AtomicUsize,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    /// An enabled provider with no latency.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            enabled: AtomicBool::new(true),
            latency: Duration::ZERO,
            gate,
            failures: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            next_tx: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            enable_calls: AtomicUsize::new(0),
        }
    }

    /// A provider that starts disabled.
    pub fn disabled() -> Self {
        let provider = Self::new();
        provider.enabled.store(false, Ordering::SeqCst);
        provider
    }

    /// Delay every submission by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next submission with `error`. Queued failures are consumed
    /// in order.
    pub fn fail_next(&self, error: ProviderError) {
        self.failures.lock().push_back(error);
    }

    /// Hold every submission until [`InMemoryProvider::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held submissions proceed.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Operations received so far, in arrival order.
    pub fn submitted(&self) -> Vec<LedgerOperation> {
        self.submitted.lock().clone()
    }

    /// Highest number of submissions ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// How many times `enable()` was called.
    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn enable(&self) -> Result<(), ProviderError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn submit(&self, operation: &LedgerOperation) -> Result<ProviderReceipt, ProviderError> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(ProviderError::NotEnabled);
        }
        self.submitted.lock().push(operation.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so the gate cannot close while we wait.
        let _ = gate.wait_for(|open| *open).await;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("0x{n:016x}");
        match operation {
            LedgerOperation::Deploy { .. } => {
                let address = LedgerAddress::new(format!("0xledger{n:08x}"))
                    .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
                Ok(ProviderReceipt::deployed(transaction_id, address))
            }
            _ => Ok(ProviderReceipt::new(transaction_id)),
        }
    }
}
