//! Durable queue transport
//!
//! Fallback transport on top of the shared store. Each message becomes a
//! [`QueueEntry`] under a zero-padded, strictly increasing key, so a prefix
//! scan returns entries in creation order.
//!
//! Entry lifecycle: `Enqueued -> Consumed | AgedOut | Corrupted`. Every
//! terminal state removes the entry; nothing goes back.
//!
//! The store has no transactions. Two instances polling at once may both see
//! an entry; whichever removes it first wins, and removing right after acting
//! keeps that window short.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message::{Message, QueueEntry};
use crate::persistence::{SharedStore, keys};
use crate::transport::{Inbound, accept};
use crate::utils::{Result, now_millis};

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries accepted and delivered inbound.
    pub delivered: usize,
    /// Entries consumed but addressed to someone else.
    pub discarded: usize,
    /// Unreadable entries removed without delivery.
    pub corrupted: usize,
    /// Entries this handle enqueued itself, left for others.
    pub skipped: usize,
}

pub struct QueueTransport {
    store: Arc<dyn SharedStore>,
    retention_ms: i64,
    origin: Uuid,
}

impl QueueTransport {
    pub fn new(store: Arc<dyn SharedStore>, retention_ms: u64) -> Self {
        Self {
            store,
            retention_ms: i64::try_from(retention_ms).unwrap_or(i64::MAX),
            origin: Uuid::new_v4(),
        }
    }

    /// Tag written into every entry this handle enqueues.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Append a message and return its queue key. Garbage collection runs
    /// after every successful enqueue.
    pub fn enqueue(&self, message: &Message) -> Result<String> {
        let seq = self.store.increment(keys::QUEUE_COUNTER)?;
        let key = keys::queue_key(seq);
        let entry = QueueEntry::new(message.clone(), key.clone()).with_origin(self.origin);
        self.store.set(&key, &entry.encode()?)?;
        debug!("Enqueued {} as {key}", message.id);

        let removed = self.collect_garbage(now_millis());
        if removed > 0 {
            info!("Queue garbage collection removed {removed} entr(ies)");
        }
        Ok(key)
    }

    /// Remove every entry created more than the retention window before
    /// `now`, consumed or not. Entries without a readable `created` stamp are
    /// removed as well. Returns the number removed.
    pub fn collect_garbage(&self, now: i64) -> usize {
        let entries = match self.store.list_prefix(keys::QUEUE_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Queue scan for garbage collection failed: {e}");
                return 0;
            }
        };

        let cutoff = now.saturating_sub(self.retention_ms);
        let mut removed = 0;
        for (key, raw) in entries {
            let created = serde_json::from_str::<serde_json::Value>(&raw)
                .ok()
                .and_then(|v| v.get("created").and_then(|c| c.as_i64()));
            let expired = match created {
                Some(created) => created < cutoff,
                None => true,
            };
            if expired {
                match self.store.remove(&key) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove expired queue entry {key}: {e}"),
                }
            }
        }
        removed
    }

    /// Consume every entry currently in the queue, oldest first. Entries
    /// written by this handle are left in place for other instances.
    pub fn drain(&self, local_id: &str, inbound: &Inbound) -> DrainReport {
        let mut report = DrainReport::default();
        let entries = match self.store.list_prefix(keys::QUEUE_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Queue scan failed: {e}");
                return report;
            }
        };

        for (key, raw) in entries {
            let entry = match QueueEntry::decode(&raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Removing corrupt queue entry {key}: {e}");
                    self.remove(&key);
                    report.corrupted += 1;
                    continue;
                }
            };

            if entry.origin == Some(self.origin) {
                report.skipped += 1;
                continue;
            }

            if accept(entry.message, local_id, self.store.as_ref(), inbound) {
                report.delivered += 1;
            } else {
                report.discarded += 1;
            }
            self.remove(&key);
        }
        report
    }

    /// Current queue contents in order. Unreadable entries are left out.
    pub fn entries(&self) -> Result<Vec<QueueEntry>> {
        Ok(self
            .store
            .list_prefix(keys::QUEUE_PREFIX)?
            .into_iter()
            .filter_map(|(_, raw)| QueueEntry::decode(&raw).ok())
            .collect())
    }

    /// Spawn the periodic drain for `local_id`.
    pub fn spawn_poller(
        self: Arc<Self>,
        local_id: String,
        inbound: Inbound,
        every: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if inbound.is_closed() {
                    break;
                }
                let report = self.drain(&local_id, &inbound);
                if report != DrainReport::default() {
                    debug!("{local_id} drained queue: {report:?}");
                }
            }
        })
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("Failed to remove queue entry {key}: {e}");
        }
    }
}

impl std::fmt::Debug for QueueTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTransport")
            .field("retention_ms", &self.retention_ms)
            .field("origin", &self.origin)
            .finish()
    }
}
