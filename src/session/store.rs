use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::persistence::{SharedStore, keys};
use crate::utils::{BridgeError, Result};

pub struct SessionStore {
    store: Arc<dyn SharedStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value).map_err(|e| BridgeError::Encode(e.to_string()))?;
        self.store.set(&keys::session_key(key), &encoded)
    }

    /// Read a value, telling an absent key (`Ok(None)`) apart from one that
    /// does not parse (`Err(BridgeError::Decode)`).
    pub fn read(&self, key: &str) -> Result<Option<Value>> {
        match self.store.get(&keys::session_key(key))? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| BridgeError::Decode(format!("session key '{key}': {e}"))),
            None => Ok(None),
        }
    }

    /// Like [`read`](Self::read) but any failure reads as "no value".
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    /// Keys currently set, without the namespace prefix.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_prefix(keys::SESSION_PREFIX)?
            .into_iter()
            .filter_map(|(k, _)| k.strip_prefix(keys::SESSION_PREFIX).map(str::to_string))
            .collect())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&keys::session_key(key))
    }

    /// Remove every session key. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for (key, _) in self.store.list_prefix(keys::SESSION_PREFIX)? {
            self.store.remove(&key)?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
