//! # Ledger Recipes
//!
//! A [`LedgerRecipe`] is the caller's deployment request in its wire shape:
//! strings throughout, capabilities by name. [`validate_recipe`] turns it
//! into a typed [`LedgerInfo`] or says why it cannot be deployed. No
//! provider call is made for a recipe that fails here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use xcert_core::SchemaId;

use crate::capability::CapabilitySet;

/// Why a recipe was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    /// A mandatory field is empty or the schema id is malformed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A capability name is not part of the enumeration.
    #[error("invalid capability: {0:?}")]
    InvalidCapability(String),
}

/// Deployment request as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerRecipe {
    /// Human-readable ledger name.
    pub name: String,
    /// Short ticker symbol.
    pub symbol: String,
    /// Base URI asset metadata is served under.
    pub uri_base: String,
    /// Hex identifier of the schema every asset is certified under.
    pub schema_id: String,
    /// Capability wire names.
    pub capabilities: Vec<String>,
}

impl LedgerRecipe {
    /// A recipe with no capabilities.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        uri_base: impl Into<String>,
        schema_id: &SchemaId,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri_base: uri_base.into(),
            schema_id: schema_id.to_hex(),
            capabilities: Vec::new(),
        }
    }

    /// Builder-style capability grant, by wire name.
    pub fn with_capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.push(name.into());
        self
    }

    /// Shorthand for [`validate_recipe`].
    pub fn validate(&self) -> Result<LedgerInfo, RecipeError> {
        validate_recipe(self)
    }
}

/// A validated recipe: what a deployed ledger is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    /// Ledger name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Metadata base URI.
    pub uri_base: String,
    /// Schema every asset is certified under.
    pub schema_id: SchemaId,
    /// Granted capabilities, fixed for the ledger's lifetime.
    pub capabilities: CapabilitySet,
}

/// Check every recipe field.
///
/// # Errors
///
/// - `RecipeError::InvalidSchema` if `name`, `symbol`, `uriBase` or
///   `schemaId` is empty, or `schemaId` is not a 32-byte hex digest.
/// - `RecipeError::InvalidCapability` for the first unrecognized name.
pub fn validate_recipe(recipe: &LedgerRecipe) -> Result<LedgerInfo, RecipeError> {
    for (field, value) in [
        ("name", &recipe.name),
        ("symbol", &recipe.symbol),
        ("uriBase", &recipe.uri_base),
        ("schemaId", &recipe.schema_id),
    ] {
        if value.trim().is_empty() {
            return Err(RecipeError::InvalidSchema(format!("recipe field `{field}` is empty")));
        }
    }
    let schema_id = SchemaId::from_hex(&recipe.schema_id)
        .map_err(|e| RecipeError::InvalidSchema(format!("recipe field `schemaId`: {e}")))?;
    let capabilities = CapabilitySet::from_names(&recipe.capabilities)?;

    Ok(LedgerInfo {
        name: recipe.name.clone(),
        symbol: recipe.symbol.clone(),
        uri_base: recipe.uri_base.clone(),
        schema_id,
        capabilities,
    })
}
