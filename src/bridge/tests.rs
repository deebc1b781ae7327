use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use super::{Bridge, BridgeOptions, FROM_APP_PARAM, TransportMode, URL_DATA_PARAM, take_url_data};
use crate::config::TimingSettings;
use crate::host::{HeadlessHost, HostEnvironment};
use crate::message::{Message, Payload, actions};
use crate::persistence::{MemoryStore, SharedStore, keys};
use crate::transport::{LocalChannelHub, UnavailableChannels};

fn fast_timing() -> TimingSettings {
    TimingSettings {
        ack_timeout_ms: 300,
        ack_poll_ms: 10,
        queue_poll_ms: 10,
        heartbeat_interval_ms: 50,
        presence_window_ms: 1_000,
        queue_retention_ms: 60_000,
        frame_linger_ms: 20,
    }
}

fn options(id: &str, mode: TransportMode) -> BridgeOptions {
    BridgeOptions::new(id, mode, "myapp").with_timing(fast_timing())
}

fn host() -> HeadlessHost {
    HeadlessHost::parse("http://localhost/apps/home").unwrap()
}

async fn next(rx: &mut UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("inbound stream closed")
}

#[test]
fn test_mode_parsing_and_display() {
    assert_eq!("native".parse::<TransportMode>().unwrap(), TransportMode::Native);
    assert_eq!(" WEB ".parse::<TransportMode>().unwrap(), TransportMode::Web);
    assert_eq!("auto".parse::<TransportMode>().unwrap(), TransportMode::Auto);
    assert!("carrier-pigeon".parse::<TransportMode>().is_err());
    assert_eq!(TransportMode::Native.to_string(), "native");
    assert_eq!(TransportMode::default(), TransportMode::Auto);
}

#[tokio::test]
async fn test_native_mode_uses_native_bridge_only() {
    let store = MemoryStore::new();
    let host = host();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Native),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    // no shell writes the ack, so the wait times out
    assert!(!bridge.send("ping", Payload::new(), Some("b")).await);
    assert_eq!(host.launched().len(), 1);
    assert!(host.launched()[0].as_str().starts_with("myapp://ping?data="));
    assert!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().is_empty());
    bridge.dispose();
}

#[tokio::test]
async fn test_native_send_succeeds_when_shell_acks() {
    let store = MemoryStore::new();
    let host = host();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Native),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    // a native shell: read the id off the launched URL and acknowledge it
    let shell_host = host.clone();
    let shell_store = store.clone();
    tokio::spawn(async move {
        loop {
            if let Some(url) = shell_host.launched().first() {
                let id = url.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.into_owned());
                if let Some(id) = id {
                    crate::ack::acknowledge(&shell_store, &id).unwrap();
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    assert!(bridge.send("ping", Payload::new(), None).await);
    bridge.dispose();
}

#[tokio::test]
async fn test_web_mode_never_touches_native_bridge() {
    let store = MemoryStore::new();
    let host = host();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Web),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    assert!(!bridge.send("hello", Payload::new(), None).await);
    assert!(host.launched().is_empty());
    assert_eq!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().len(), 1);
    bridge.dispose();
}

#[tokio::test]
async fn test_lone_instance_without_id_is_not_acked_by_itself() {
    let store = MemoryStore::new();
    let bridge = Bridge::initialize(
        options("", TransportMode::Web),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host()),
    );
    let mut rx = bridge.take_messages().unwrap();

    assert!(!bridge.send("hello", Payload::new(), None).await);
    assert!(rx.try_recv().is_err());
    assert_eq!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().len(), 1);
    bridge.dispose();
}

#[tokio::test]
async fn test_auto_mode_with_target_uses_web_only() {
    let store = MemoryStore::new();
    let host = host();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Auto),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    assert!(!bridge.send("ping", Payload::new(), Some("b")).await);
    assert!(host.launched().is_empty());
    assert_eq!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().len(), 1);
    bridge.dispose();
}

#[tokio::test]
async fn test_auto_mode_without_target_prefers_native() {
    let store = MemoryStore::new();
    let host = host();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Auto),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    bridge.send("hello", Payload::new(), None).await;
    assert_eq!(host.launched().len(), 1);
    assert!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().is_empty());
    bridge.dispose();
}

#[tokio::test]
async fn test_auto_mode_falls_back_to_web_when_native_fails() {
    let store = MemoryStore::new();
    let host = host();
    host.refuse_frames(true);
    let bridge = Bridge::initialize(
        options("a", TransportMode::Auto),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    bridge.send("hello", Payload::new(), None).await;
    assert!(host.launched().is_empty());
    assert_eq!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().len(), 1);
    bridge.dispose();
}

#[tokio::test]
async fn test_broadcast_is_preferred_when_available() {
    let store = MemoryStore::new();
    let hub = LocalChannelHub::new();
    let a = Bridge::initialize(options("a", TransportMode::Web), Arc::new(store.clone()), &hub, Arc::new(host()));
    let b = Bridge::initialize(options("b", TransportMode::Web), Arc::new(store.clone()), &hub, Arc::new(host()));
    assert!(a.is_broadcast_active());
    let mut b_rx = b.take_messages().unwrap();

    assert!(a.send("ping", Payload::new(), Some("b")).await);
    assert_eq!(next(&mut b_rx).await.action, "ping");
    assert!(store.list_prefix(keys::QUEUE_PREFIX).unwrap().is_empty());

    a.dispose();
    b.dispose();
}

#[tokio::test]
async fn test_url_data_is_delivered_and_stripped() {
    let host = HeadlessHost::parse(&format!(
        "http://localhost/apps/home?tab=2&{URL_DATA_PARAM}=%7B%22order%22%3A42%7D"
    ))
    .unwrap();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Web),
        Arc::new(MemoryStore::new()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    let mut rx = bridge.take_messages().unwrap();
    let msg = next(&mut rx).await;
    assert_eq!(msg.action, actions::URL_DATA);
    assert_eq!(msg.payload.get("order"), Some(&json!(42)));
    assert_eq!(msg.source, None);
    assert_eq!(host.location().as_str(), "http://localhost/apps/home?tab=2");
    bridge.dispose();
}

#[test]
fn test_url_data_edge_cases() {
    let plain = HeadlessHost::parse("http://localhost/?x=1").unwrap();
    assert!(take_url_data(&plain).is_none());
    assert_eq!(plain.location().as_str(), "http://localhost/?x=1");

    let scalar = HeadlessHost::parse(&format!("http://localhost/?{URL_DATA_PARAM}=7")).unwrap();
    let msg = take_url_data(&scalar).unwrap();
    assert_eq!(msg.payload.get("value"), Some(&json!(7)));
    assert_eq!(scalar.location().as_str(), "http://localhost/");

    let broken = HeadlessHost::parse(&format!("http://localhost/?{URL_DATA_PARAM}=%7Bnope")).unwrap();
    assert!(take_url_data(&broken).is_none());
    assert_eq!(broken.location().as_str(), "http://localhost/");
}

#[tokio::test]
async fn test_app_url_is_same_origin_with_from_app() {
    let bridge = Bridge::initialize(
        options("dashboard", TransportMode::Native),
        Arc::new(MemoryStore::new()),
        &UnavailableChannels,
        Arc::new(host()),
    );

    let url = bridge
        .app_url("/apps/editor", &[("doc", "7"), (FROM_APP_PARAM, "spoofed")])
        .unwrap();
    assert_eq!(url.as_str(), "http://localhost/apps/editor?doc=7&from_app=dashboard");

    assert!(bridge.app_url("https://elsewhere.example/", &[]).is_err());
    bridge.dispose();
}

#[tokio::test]
async fn test_navigate_sends_navigate_action() {
    let host = host();
    let bridge = Bridge::initialize(
        options("dashboard", TransportMode::Native),
        Arc::new(MemoryStore::new()),
        &UnavailableChannels,
        Arc::new(host.clone()),
    );

    bridge.navigate_to_app("settings", &[("section", "privacy")]).await;
    let launched = host.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].host_str(), Some(actions::NAVIGATE));

    let data = launched[0]
        .query_pairs()
        .find(|(k, _)| k == "data")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let payload: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(
        payload["url"],
        json!("http://localhost/apps/settings?section=privacy&from_app=dashboard")
    );
    bridge.dispose();
}

#[tokio::test]
async fn test_session_round_trip_and_clear() {
    let bridge = Bridge::initialize(
        options("a", TransportMode::Web),
        Arc::new(MemoryStore::new()),
        &UnavailableChannels,
        Arc::new(host()),
    );
    let value = json!({"theme": "dark", "sizes": [1, 2, 3]});

    assert!(bridge.set_session_data("prefs", value.clone()));
    assert_eq!(bridge.get_session_data("prefs"), Some(value));

    assert!(bridge.clear_session());
    assert_eq!(bridge.get_session_data("prefs"), None);
    bridge.dispose();
}

#[tokio::test]
async fn test_dispose_cancels_pending_send_and_closes_stream() {
    let store = MemoryStore::new();
    let bridge = Bridge::initialize(
        options("a", TransportMode::Web).with_timing(TimingSettings {
            ack_timeout_ms: 10_000,
            ..fast_timing()
        }),
        Arc::new(store.clone()),
        &UnavailableChannels,
        Arc::new(host()),
    );
    let mut rx = bridge.take_messages().unwrap();
    assert!(bridge.take_messages().is_none());

    let sender = bridge.clone();
    let pending = tokio::spawn(async move { sender.send("ping", Payload::new(), Some("b")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    bridge.dispose();
    let result = tokio::time::timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
    assert!(!result);

    let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert!(closed.is_none());
    assert!(store.get(&keys::heartbeat_key("a")).unwrap().is_none());
    assert!(!bridge.send("ping", Payload::new(), None).await);

    // second dispose is a no-op
    bridge.dispose();
    assert!(bridge.is_disposed());
}
