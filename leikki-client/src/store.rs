//! On-device key-value storage for secrets such as the auth session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::AppError;

pub const KEY_PREFIX: &str = "leikkitsemppari:";
const KEYRING_SERVICE: &str = "leikkitsemppari";

/// Namespaced get/set/remove of string values.
pub trait SecretStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove_item(&self, key: &str) -> Result<(), AppError>;
}

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// OS keyring backed store.
pub struct KeyringStore;

impl KeyringStore {
    fn entry(key: &str) -> Result<keyring::Entry, AppError> {
        keyring::Entry::new(KEYRING_SERVICE, &namespaced(key))
            .map_err(|e| AppError::Store(e.to_string()))
    }

    /// Checks the keyring answers at all; a missing entry counts as reachable.
    fn probe() -> Result<(), keyring::Error> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &namespaced("probe"))?;
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl SecretStore for KeyringStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        match Self::entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::Store(e.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|e| AppError::Store(e.to_string()))
    }

    fn remove_item(&self, key: &str) -> Result<(), AppError> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Store(e.to_string())),
        }
    }
}

/// Process-local store, used when no keyring is available.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.items
            .lock()
            .map_err(|_| AppError::Store("memory store poisoned".into()))
    }
}

impl SecretStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.items()?.get(&namespaced(key)).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.items()?.insert(namespaced(key), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AppError> {
        self.items()?.remove(&namespaced(key));
        Ok(())
    }
}

/// The keyring when reachable, otherwise an in-memory store.
pub fn open_default() -> Arc<dyn SecretStore> {
    match KeyringStore::probe() {
        Ok(()) => Arc::new(KeyringStore),
        Err(e) => {
            warn!(error=%e, "keyring unavailable; session will not survive this process");
            Arc::new(MemoryStore::new())
        }
    }
}
