use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{AckOutcome, AckTracker, MAX_ATTEMPTS, acknowledge};
use crate::persistence::{MemoryStore, SharedStore, keys};

fn tracker(store: &MemoryStore, timeout_ms: u64) -> Arc<AckTracker> {
    Arc::new(AckTracker::new(
        Arc::new(store.clone()),
        Duration::from_millis(10),
        Duration::from_millis(timeout_ms),
    ))
}

#[test]
fn test_outcome_success_mapping() {
    assert!(AckOutcome::Acked.is_success());
    assert!(!AckOutcome::TimedOut.is_success());
    assert!(!AckOutcome::Cancelled.is_success());
}

#[tokio::test]
async fn test_existing_ack_resolves_immediately_and_is_deleted() {
    let store = MemoryStore::new();
    acknowledge(&store, "m1").unwrap();

    let outcome = tracker(&store, 1_000).wait("m1").await;
    assert_eq!(outcome, AckOutcome::Acked);
    assert_eq!(store.get(&keys::ack_key("m1")).unwrap(), None);
}

#[tokio::test]
async fn test_late_ack_is_observed() {
    let store = MemoryStore::new();
    let acks = tracker(&store, 2_000);

    let writer = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        acknowledge(&writer, "m2").unwrap();
    });

    assert_eq!(acks.wait("m2").await, AckOutcome::Acked);
}

#[tokio::test]
async fn test_missing_ack_times_out_once() {
    let store = MemoryStore::new();
    let acks = tracker(&store, 100);

    let started = Instant::now();
    assert_eq!(acks.wait("never").await, AckOutcome::TimedOut);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    // single attempt: no retries stretch the wait
    assert!(elapsed < Duration::from_millis(100 * MAX_ATTEMPTS as u64));
    assert_eq!(acks.pending_count(), 0);
}

#[tokio::test]
async fn test_pending_state_is_tracked_while_waiting() {
    let store = MemoryStore::new();
    let acks = tracker(&store, 500);

    let waiter = {
        let acks = acks.clone();
        tokio::spawn(async move { acks.wait("m3").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let pending = acks.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message_id, "m3");
    assert_eq!(pending[0].attempts, 1);

    acknowledge(&store, "m3").unwrap();
    assert_eq!(waiter.await.unwrap(), AckOutcome::Acked);
    assert_eq!(acks.pending_count(), 0);
}

#[tokio::test]
async fn test_cancel_all_resolves_waiters() {
    let store = MemoryStore::new();
    let acks = tracker(&store, 10_000);

    let waiter = {
        let acks = acks.clone();
        tokio::spawn(async move { acks.wait("m4").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    acks.cancel_all();

    let outcome = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(outcome, AckOutcome::Cancelled);

    // later waits resolve straight away
    assert_eq!(acks.wait("m5").await, AckOutcome::Cancelled);
}
