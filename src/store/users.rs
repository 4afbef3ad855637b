//! Per-user profile persistence.
//!
//! One JSON document per user at `{root}/{userId}.json`. Saves replace the
//! whole record; fields absent from the new record are dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{CleanBitesError, Result};

use super::ContentStore;

/// Field holding the externally issued user identifier.
pub const USER_ID_FIELD: &str = "userId";

/// A free-form user profile. The only field with meaning to the store is
/// [`USER_ID_FIELD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Wrap a JSON value. Fails unless it is an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CleanBitesError::Validation(format!(
                "user record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The embedded user identifier, if present and a non-empty string.
    pub fn user_id(&self) -> Option<&str> {
        self.0
            .get(USER_ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Look up a profile field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn require_user_id(&self) -> Result<&str> {
        self.user_id().ok_or_else(|| {
            CleanBitesError::Validation(format!("record is missing '{USER_ID_FIELD}'"))
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Store of user records keyed by `userId`.
#[derive(Debug, Clone)]
pub struct UserStore {
    store: ContentStore,
}

impl UserStore {
    pub fn new(store: ContentStore) -> Self {
        Self { store }
    }

    /// Persist `record` under its embedded `userId`, replacing any previous
    /// record, and return that id.
    pub fn save(&self, record: &UserRecord) -> Result<String> {
        let user_id = record.require_user_id()?;
        self.store.put(user_id, record)?;
        info!(user_id = %user_id, "Saved user details");
        Ok(user_id.to_string())
    }

    /// Load the record for `user_id`, or `None` if the user has never saved
    /// one.
    pub fn load(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.store.get(user_id)
    }

    /// Replace the record stored at `user_id`.
    ///
    /// The record's own `userId` must equal `user_id`.
    pub fn update(&self, user_id: &str, record: &UserRecord) -> Result<()> {
        let embedded = record.require_user_id()?;
        if embedded != user_id {
            return Err(CleanBitesError::Mismatch {
                expected: user_id.to_string(),
                found: embedded.to_string(),
            });
        }
        self.store.put(user_id, record)?;
        info!(user_id = %user_id, "Updated user details");
        Ok(())
    }

    /// Whether a record exists for `user_id`.
    pub fn exists(&self, user_id: &str) -> bool {
        self.store.exists(user_id)
    }
}
