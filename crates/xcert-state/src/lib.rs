//! # xcert-state: Capability-Gated Ledger State Machine
//!
//! The synchronous core of an asset ledger. Nothing in this crate performs
//! I/O or waits: it decides whether an operation is legal against the
//! current state and, once the provider has carried the operation out,
//! applies its effect exactly once.
//!
//! ## States
//!
//! ```text
//! Uninitialized ──▶ Deploying ──▶ Active ◀──▶ Frozen
//!       ▲               │
//!       └───────────────┘ (deployment failed)
//! ```
//!
//! `Frozen` is `Active` with transfers disabled. Every lifecycle operation
//! other than deployment requires `Active` or `Frozen`.
//!
//! ## Modules
//!
//! - **Capability** (`capability.rs`): the fixed permission enumeration and
//!   the immutable set a ledger is deployed with.
//! - **Recipe** (`recipe.rs`): deployment input and its validation.
//! - **Operation** (`operation.rs`): the operations a provider carries out.
//! - **Ledger** (`ledger.rs`): state, authorization, and effect application.

pub mod capability;
pub mod ledger;
pub mod operation;
pub mod recipe;

pub use capability::{Capability, CapabilitySet};
pub use ledger::{
    Applied, AssetRecord, Ledger, LedgerEffect, LedgerError, LedgerState, LedgerTransitionRecord,
};
pub use operation::{LedgerOperation, OperationKind, ProviderReceipt};
pub use recipe::{validate_recipe, LedgerInfo, LedgerRecipe, RecipeError};
