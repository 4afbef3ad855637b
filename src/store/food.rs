//! Latest food-label submission, one slot per session.
//!
//! Each session owns `{root}/{sessionId}.json`; a new submission replaces the
//! previous one for that session only. Clients that send no session id share
//! [`DEFAULT_SESSION`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{CleanBitesError, Result};

use super::ContentStore;

/// Slot used when a request carries no session identifier.
pub const DEFAULT_SESSION: &str = "default";

/// Food-label data submitted for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDetails {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub nutrition_info: String,
    /// Any further fields an image extraction produced.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FoodDetails {
    pub fn new(
        product_name: impl Into<String>,
        ingredients: impl Into<String>,
        nutrition_info: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            ingredients: ingredients.into(),
            nutrition_info: nutrition_info.into(),
            extra: Map::new(),
        }
    }

    /// Build from a JSON submission. `productName` and `ingredients` must be
    /// present.
    pub fn from_submission(value: Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            CleanBitesError::Validation("food details must be a JSON object".into())
        })?;
        for field in ["productName", "ingredients"] {
            if !obj.contains_key(field) {
                return Err(CleanBitesError::Validation(format!(
                    "missing required field '{field}'"
                )));
            }
        }
        Self::from_value(value)
    }

    /// Build from any JSON object, e.g. text returned by label extraction.
    /// Missing standard fields default to empty strings.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| CleanBitesError::Validation(format!("invalid food details: {e}")))
    }

    /// Canonical text form used in prompts and cache keys.
    pub fn to_prompt_text(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CleanBitesError::Validation(format!("food details not serializable: {e}")))
    }
}

/// Per-session store of the latest [`FoodDetails`].
#[derive(Debug, Clone)]
pub struct FoodSearchStore {
    store: ContentStore,
}

impl FoodSearchStore {
    pub fn new(store: ContentStore) -> Self {
        Self { store }
    }

    /// Replace the session's slot with `details`.
    pub fn save(&self, session_id: &str, details: &FoodDetails) -> Result<()> {
        self.store.put(session_id, details)?;
        info!(session = %session_id, product = %details.product_name, "Saved food details");
        Ok(())
    }

    /// The session's latest submission, if any.
    pub fn load(&self, session_id: &str) -> Result<Option<FoodDetails>> {
        self.store.get(session_id)
    }
}
