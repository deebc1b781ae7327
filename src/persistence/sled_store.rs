//! Shared store backed by `sled`.
//!
//! Keys and values are stored as UTF-8 bytes in the default tree. sled keeps
//! keys sorted, so prefix scans already come back in ascending order, which
//! the durable queue relies on.

use sled::Db;

use crate::persistence::store::{SharedStore, bump};
use crate::utils::{BridgeError, Result};

#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| BridgeError::Decode(e.to_string()))
}

impl SharedStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Some(utf8(&value)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (k, v) = item?;
            // a non-UTF-8 record is skipped here; its owner deals with it
            match (utf8(&k), utf8(&v)) {
                (Ok(k), Ok(v)) => entries.push((k, v)),
                _ => tracing::warn!("Skipping non UTF-8 record under prefix {prefix}"),
            }
        }
        Ok(entries)
    }

    /// Atomic within the database: sled retries the closure on contention.
    fn increment(&self, key: &str) -> Result<u64> {
        let mut overflow = None;
        let updated = self.db.update_and_fetch(key.as_bytes(), |old| {
            let current = old
                .and_then(|raw| std::str::from_utf8(raw).ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(0);
            match bump(key, current) {
                Ok(next) => {
                    overflow = None;
                    Some(next.to_string().into_bytes())
                }
                Err(e) => {
                    // returning None would delete the key; keep it as is
                    overflow = Some(e);
                    old.map(|raw| raw.to_vec())
                }
            }
        })?;
        if let Some(e) = overflow {
            return Err(e);
        }

        updated
            .as_deref()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| BridgeError::Store(format!("counter '{key}' unreadable after update")))
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
