use log::warn;
use serde_json::Value;

use crate::error::Result;

pub const LAST_STATUS: &str = "last_status";
pub const EXPIRES_AT: &str = "expires_at";
pub const LAST_EVENT_AT: &str = "last_event_at";
pub const LAST_ERROR_AT: &str = "last_error_at";

/// Durable key-value memory that survives between triggers.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Apply several writes; `None` removes the key.
    fn set_many(&self, entries: &[(&str, Option<String>)]) -> Result<()> {
        for (key, value) in entries {
            match value {
                Some(v) => self.set(key, v)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// Everything the agent remembers between triggers.
///
/// Loaded before a trigger, mutated only after the step it records has
/// succeeded, and written back afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentMemory {
    /// Envelope of the last folder listing, the baseline for the next diff.
    pub last_status: Option<Value>,
    /// Unix seconds at which the current access token expires.
    pub expires_at: Option<i64>,
    pub last_event_at: Option<i64>,
    pub last_error_at: Option<i64>,
}

impl AgentMemory {
    pub fn load(store: &dyn StateStore) -> Result<Self> {
        let last_status = match store.get(LAST_STATUS)? {
            Some(s) => Some(serde_json::from_str(&s)?),
            None => None,
        };
        Ok(Self {
            last_status,
            expires_at: load_i64(store, EXPIRES_AT)?,
            last_event_at: load_i64(store, LAST_EVENT_AT)?,
            last_error_at: load_i64(store, LAST_ERROR_AT)?,
        })
    }

    pub fn save(&self, store: &dyn StateStore) -> Result<()> {
        let last_status = match &self.last_status {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        store.set_many(&[
            (LAST_STATUS, last_status),
            (EXPIRES_AT, self.expires_at.map(|v| v.to_string())),
            (LAST_EVENT_AT, self.last_event_at.map(|v| v.to_string())),
            (LAST_ERROR_AT, self.last_error_at.map(|v| v.to_string())),
        ])
    }
}

fn load_i64(store: &dyn StateStore, key: &str) -> Result<Option<i64>> {
    Ok(store.get(key)?.and_then(|s| match s.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring unreadable {key} in state store: {s:?}");
            None
        }
    }))
}
