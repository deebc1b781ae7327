use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::utils::{BridgeError, Result};

/// Narrow interface over the shared key-value store.
///
/// String keys, string values, no multi-key atomicity. Implementations must
/// return [`list_prefix`](SharedStore::list_prefix) results in ascending key
/// order.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Bump the decimal counter stored at `key` and return the new value.
    ///
    /// The default is a plain read-then-write; concurrent writers may
    /// interleave. Backends that can do better override it.
    fn increment(&self, key: &str) -> Result<u64> {
        let current = match self.get(key)? {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or(0),
            None => 0,
        };
        let next = bump(key, current)?;
        self.set(key, &next.to_string())?;
        Ok(next)
    }
}

/// In-memory store. Clones share the same map, so several instances in one
/// process see each other's writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Next counter value; a counter at its maximum is left alone and reported.
pub(crate) fn bump(key: &str, current: u64) -> Result<u64> {
    current
        .checked_add(1)
        .ok_or_else(|| BridgeError::Store(format!("counter '{key}' overflowed")))
}

fn poisoned<T>(_: T) -> BridgeError {
    BridgeError::Store("memory store lock poisoned".to_string())
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn increment(&self, key: &str) -> Result<u64> {
        let mut data = self.data.write().map_err(poisoned)?;
        let current = data
            .get(key)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let next = bump(key, current)?;
        data.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}
