use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::persistence::{SharedStore, keys};
use crate::utils::{Result, now_millis};

pub struct PresenceTracker {
    store: Arc<dyn SharedStore>,
    app_id: String,
    window_ms: i64,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn SharedStore>, app_id: &str, window_ms: u64) -> Self {
        Self {
            store,
            app_id: app_id.to_string(),
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
        }
    }

    /// Record that this instance is alive right now.
    pub fn beat(&self) -> Result<()> {
        self.store
            .set(&keys::heartbeat_key(&self.app_id), &now_millis().to_string())
    }

    /// Ids whose heartbeat is younger than the window at `now`, including
    /// this instance's own. Unreadable records, and stamps later than `now`,
    /// are skipped.
    pub fn list_active_at(&self, now: i64) -> Result<BTreeSet<String>> {
        let mut active = BTreeSet::new();
        for (key, raw) in self.store.list_prefix(keys::HEARTBEAT_PREFIX)? {
            let Some(id) = key.strip_prefix(keys::HEARTBEAT_PREFIX) else {
                continue;
            };
            let Ok(last_seen) = raw.trim().parse::<i64>() else {
                debug!("Ignoring unreadable heartbeat for {id}");
                continue;
            };
            match now.checked_sub(last_seen) {
                Some(age) if (0..self.window_ms).contains(&age) => {
                    active.insert(id.to_string());
                }
                Some(age) if age >= 0 => {}
                _ => debug!("Ignoring out-of-range heartbeat for {id}: {last_seen}"),
            }
        }
        Ok(active)
    }

    /// Snapshot of live instances; empty if the store cannot be read.
    pub fn list_active(&self) -> BTreeSet<String> {
        self.list_active_at(now_millis()).unwrap_or_else(|e| {
            warn!("Presence scan failed: {e}");
            BTreeSet::new()
        })
    }

    /// Remove this instance's heartbeat on clean shutdown.
    pub fn retire(&self) -> Result<()> {
        self.store.remove(&keys::heartbeat_key(&self.app_id))
    }

    /// Beat now and then on every interval. Instances without an id do not
    /// advertise themselves, so `None` is returned for them.
    pub fn spawn_heartbeat(self: Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if self.app_id.is_empty() {
            return None;
        }
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.beat() {
                    warn!("Heartbeat for {} failed: {e}", self.app_id);
                }
            }
        }))
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("app_id", &self.app_id)
            .field("window_ms", &self.window_ms)
            .finish()
    }
}
