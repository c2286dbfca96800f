use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use keyring::{Entry, Error as KeyringError};

use crate::error::{Error, Result};

const SERVICE: &str = "outlook_agent";

pub const ACCESS_TOKEN: &str = "outlook_access_token";
pub const REFRESH_TOKEN: &str = "outlook_refresh_token";
pub const CLIENT_SECRET: &str = "outlook_client_secret";

/// Named secrets shared with whatever else reuses the mailbox tokens.
pub trait CredentialStore {
    fn get(&self, name: &str) -> Result<Option<String>>;
    /// Persist `value` under `name`. Writing the same value twice is harmless.
    fn set(&self, name: &str, value: &str) -> Result<()>;
}

/// OS keyring, one entry per credential name.
pub struct KeyringStore;

impl CredentialStore for KeyringStore {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE, name).map_err(keyring_err)?;
        match entry.get_password() {
            Ok(v) => Ok(Some(v)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(keyring_err(e)),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        let entry = Entry::new(SERVICE, name).map_err(keyring_err)?;
        entry.set_password(value).map_err(keyring_err)?;
        Ok(())
    }
}

fn keyring_err(e: KeyringError) -> Error {
    Error::Credential(e.to_string())
}

/// In-process credentials. Used by tests and by `run --dry-run`, which must
/// not touch the real keyring.
#[derive(Default)]
pub struct MemoryCredentials {
    values: RwLock<HashMap<String, String>>,
    writes: RwLock<Vec<(String, String)>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Every `set` call seen so far, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.read().map(|w| w.clone()).unwrap_or_default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> Error {
    Error::Credential(e.to_string())
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.read().map_err(poisoned)?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), value.to_string());
        self.writes
            .write()
            .map_err(poisoned)?
            .push((name.to_string(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn memory_credentials_record_writes_in_order() {
        let creds = MemoryCredentials::new().with(ACCESS_TOKEN, "seed");
        creds.set(ACCESS_TOKEN, "at-2").unwrap();
        creds.set(REFRESH_TOKEN, "rt-2").unwrap();

        assert_eq!(creds.get(ACCESS_TOKEN).unwrap().as_deref(), Some("at-2"));
        assert_eq!(
            creds.writes(),
            vec![
                (ACCESS_TOKEN.to_string(), "at-2".to_string()),
                (REFRESH_TOKEN.to_string(), "rt-2".to_string()),
            ]
        );
    }

    #[test]
    fn poisoned_lock_is_a_credential_error() {
        let creds = Arc::new(MemoryCredentials::new().with(ACCESS_TOKEN, "seed"));

        let holder = creds.clone();
        let _ = thread::spawn(move || {
            let _guard = holder.values.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(creds.get(ACCESS_TOKEN), Err(Error::Credential(_))));
        assert!(matches!(
            creds.set(ACCESS_TOKEN, "at-2"),
            Err(Error::Credential(_))
        ));
    }
}
