use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::persistence::{SharedStore, keys};
use crate::utils::{Result, now_millis};

/// Reserved retry budget per message. Not spent: a send resolves after its
/// first attempt.
pub const MAX_ATTEMPTS: u8 = 3;

/// Write the acknowledgment marker for `message_id`.
pub fn acknowledge(store: &dyn SharedStore, message_id: &str) -> Result<()> {
    store.set(&keys::ack_key(message_id), "1")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A receiver acknowledged the message.
    Acked,
    /// No acknowledgment within the timeout.
    TimedOut,
    /// The tracker was shut down while waiting.
    Cancelled,
}

impl AckOutcome {
    pub fn is_success(self) -> bool {
        self == AckOutcome::Acked
    }
}

#[derive(Debug, Clone)]
pub struct PendingAck {
    pub message_id: String,
    pub sent_at: i64,
    pub attempts: u8,
}

pub struct AckTracker {
    store: Arc<dyn SharedStore>,
    poll: Duration,
    timeout: Duration,
    pending: Mutex<HashMap<String, PendingAck>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl AckTracker {
    pub fn new(store: Arc<dyn SharedStore>, poll: Duration, timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            poll,
            timeout,
            pending: Mutex::new(HashMap::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Wait for the acknowledgment of `message_id`, the timeout, or
    /// cancellation, whichever comes first.
    pub async fn wait(&self, message_id: &str) -> AckOutcome {
        self.track(message_id);

        let outcome = tokio::select! {
            _ = self.poll_for(message_id) => AckOutcome::Acked,
            _ = tokio::time::sleep(self.timeout) => AckOutcome::TimedOut,
            _ = cancelled(self.shutdown_rx.clone()) => AckOutcome::Cancelled,
        };

        self.untrack(message_id);
        match outcome {
            AckOutcome::Acked => debug!("Message {message_id} acknowledged"),
            AckOutcome::TimedOut => warn!(
                "No acknowledgment for {message_id} within {}ms",
                self.timeout.as_millis()
            ),
            AckOutcome::Cancelled => debug!("Wait for {message_id} cancelled"),
        }
        outcome
    }

    /// Resolve every current and future wait as cancelled.
    pub fn cancel_all(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn pending(&self) -> Vec<PendingAck> {
        self.pending
            .lock()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Returns once the marker has been seen and deleted.
    async fn poll_for(&self, message_id: &str) {
        let key = keys::ack_key(message_id);
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.store.get(&key) {
                Ok(Some(_)) => {
                    if let Err(e) = self.store.remove(&key) {
                        warn!("Failed to delete acknowledgment {key}: {e}");
                    }
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!("Acknowledgment poll for {message_id} failed: {e}"),
            }
        }
    }

    fn track(&self, message_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(
                message_id.to_string(),
                PendingAck {
                    message_id: message_id.to_string(),
                    sent_at: now_millis(),
                    attempts: 1,
                },
            );
        }
    }

    fn untrack(&self, message_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(message_id);
        }
    }
}

/// Completes once the shutdown flag is raised.
async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // sender lives as long as the tracker
            std::future::pending::<()>().await;
        }
    }
}

impl std::fmt::Debug for AckTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckTracker")
            .field("poll", &self.poll)
            .field("timeout", &self.timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}
