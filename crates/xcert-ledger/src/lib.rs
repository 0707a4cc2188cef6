//! # xcert-ledger: Asynchronous Ledger Orchestration
//!
//! Wraps the synchronous [`xcert_state::Ledger`] with everything that
//! involves waiting:
//!
//! - **Provider** (`provider.rs`): the external collaborator that carries
//!   operations out, behind an `async` trait, plus an in-memory
//!   implementation for development and tests.
//! - **Mutation** (`mutation.rs`): a handle on one in-flight operation
//!   (`Pending → Completed | Failed`) and the registry that settles each
//!   mutation exactly once.
//! - **LedgerHandle** (`handle.rs`): the cloneable entry point. At most one
//!   state-changing operation per ledger is in flight at any time; reads
//!   never wait on it.
//! - **Config** (`config.rs`): environment-driven settings.
//!
//! ## Concurrency Model
//!
//! The ledger state sits behind a `parking_lot::RwLock` that is never held
//! across an `.await`. Serialization of mutating operations is a separate
//! `tokio::sync::Mutex` guard, taken before local checks and released only
//! once the provider has answered. Dropping a [`Mutation`] or timing out
//! while awaiting it does not cancel the provider call.

pub mod config;
pub mod handle;
pub mod mutation;
pub mod provider;

pub use config::{ConfigError, LedgerConfig};
pub use handle::LedgerHandle;
pub use mutation::{
    Mutation, MutationError, MutationFailure, MutationRecord, MutationRegistry, MutationResult,
    MutationStatus,
};
pub use provider::{InMemoryProvider, Provider, ProviderError};
