//! Bridge engine
//!
//! Concurrency notes:
//! - Background work (broadcast receive loop or queue poller, heartbeat) runs
//!   as Tokio tasks that hold only the store, the inbound sender and the
//!   component they drive, never the bridge itself. Dropping the last
//!   `Bridge` handle aborts them.
//! - `send` suspends the caller between publish and acknowledgment; it does
//!   not block a thread. `dispose` resolves every waiting send as `false`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::ack::AckTracker;
use crate::bridge::TransportMode;
use crate::config::{Settings, TimingSettings};
use crate::host::HostEnvironment;
use crate::message::{Message, Payload, actions};
use crate::persistence::SharedStore;
use crate::presence::PresenceTracker;
use crate::session::SessionStore;
use crate::transport::{BroadcastTransport, ChannelProvider, Inbound, NativeBridge, QueueTransport};
use crate::utils::{BridgeError, Result};

/// Reserved address-bar parameter carrying URL-encoded JSON for the instance.
pub const URL_DATA_PARAM: &str = "app_data";

/// Parameter naming the sender on navigation URLs.
pub const FROM_APP_PARAM: &str = "from_app";

/// What an instance is initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    pub app_id: String,
    pub mode: TransportMode,
    pub url_scheme: String,
    pub channel_name: String,
    pub timing: TimingSettings,
}

impl BridgeOptions {
    pub fn new(app_id: &str, mode: TransportMode, url_scheme: &str) -> Self {
        let defaults = Settings::default();
        Self {
            app_id: app_id.to_string(),
            mode,
            url_scheme: url_scheme.to_string(),
            channel_name: defaults.bridge.channel_name,
            timing: defaults.timing,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            app_id: settings.bridge.app_id.clone(),
            mode: settings.bridge.mode,
            url_scheme: settings.bridge.url_scheme.clone(),
            channel_name: settings.bridge.channel_name.clone(),
            timing: settings.timing.clone(),
        }
    }

    pub fn with_timing(mut self, timing: TimingSettings) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_channel_name(mut self, name: &str) -> Self {
        self.channel_name = name.to_string();
        self
    }
}

struct Inner {
    options: BridgeOptions,
    host: Arc<dyn HostEnvironment>,
    broadcast_active: bool,
    broadcast: RwLock<Option<BroadcastTransport>>,
    queue: Arc<QueueTransport>,
    native: NativeBridge,
    acks: AckTracker,
    presence: Arc<PresenceTracker>,
    session: SessionStore,
    inbound: Mutex<Option<Inbound>>,
    messages: Mutex<Option<UnboundedReceiver<Message>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Handle to one communicating instance.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Bring an instance up. Must be called from within a Tokio runtime.
    ///
    /// The broadcast channel is tried exactly once; without it the durable
    /// queue is polled for the lifetime of the instance. Any payload in the
    /// reserved address-bar parameter is delivered as a `urlData` message
    /// before anything else and removed from the address.
    pub fn initialize(
        options: BridgeOptions,
        store: Arc<dyn SharedStore>,
        channels: &dyn ChannelProvider,
        host: Arc<dyn HostEnvironment>,
    ) -> Self {
        let timing = options.timing.clone();
        let app_id = options.app_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::new();

        if let Some(message) = take_url_data(host.as_ref()) {
            let _ = tx.send(message);
        }

        let broadcast = BroadcastTransport::open(channels, &options.channel_name);
        let queue = Arc::new(QueueTransport::new(store.clone(), timing.queue_retention_ms));
        match &broadcast {
            Some(channel) => tasks.push(channel.listen(app_id.clone(), store.clone(), tx.clone())),
            None => tasks.push(
                queue
                    .clone()
                    .spawn_poller(app_id.clone(), tx.clone(), timing.queue_poll()),
            ),
        }

        let presence = Arc::new(PresenceTracker::new(
            store.clone(),
            &app_id,
            timing.presence_window_ms,
        ));
        if let Some(heartbeat) = presence.clone().spawn_heartbeat(timing.heartbeat_interval()) {
            tasks.push(heartbeat);
        }

        info!(
            "Instance '{app_id}' initialized (mode: {}, broadcast: {})",
            options.mode,
            broadcast.is_some()
        );

        let inner = Inner {
            native: NativeBridge::new(&options.url_scheme, host.clone(), timing.frame_linger()),
            acks: AckTracker::new(store.clone(), timing.ack_poll(), timing.ack_timeout()),
            session: SessionStore::new(store),
            broadcast_active: broadcast.is_some(),
            broadcast: RwLock::new(broadcast),
            queue,
            presence,
            host,
            options,
            inbound: Mutex::new(Some(tx)),
            messages: Mutex::new(Some(rx)),
            tasks: Mutex::new(tasks),
            disposed: AtomicBool::new(false),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.inner.options.app_id
    }

    pub fn mode(&self) -> TransportMode {
        self.inner.options.mode
    }

    pub fn is_broadcast_active(&self) -> bool {
        self.inner.broadcast_active
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Take the inbound message stream. Only the first call gets it; the
    /// stream ends when the bridge is disposed.
    pub fn take_messages(&self) -> Option<UnboundedReceiver<Message>> {
        self.inner.messages.lock().ok().and_then(|mut m| m.take())
    }

    /// Send `action` with `payload`, to `target` or to everyone, and wait for
    /// the first acknowledgment.
    ///
    /// Resolves `false` when no transport took the message, when no
    /// acknowledgment arrived within the timeout, or when the bridge was
    /// disposed meanwhile.
    pub async fn send(&self, action: &str, payload: Payload, target: Option<&str>) -> bool {
        if self.is_disposed() {
            warn!("send('{action}') on a disposed bridge");
            return false;
        }

        let message = Message::new(action, payload, self.source(), target.map(str::to_string));
        let published = match (self.mode(), message.target.is_some()) {
            (TransportMode::Native, _) => self.publish_native(&message),
            (TransportMode::Web, _) | (TransportMode::Auto, true) => self.publish_web(&message),
            (TransportMode::Auto, false) => {
                self.publish_native(&message) || self.publish_web(&message)
            }
        };

        if !published {
            debug!("No transport accepted message {}", message.id);
            return false;
        }
        self.inner.acks.wait(&message.id).await.is_success()
    }

    /// Ask whoever handles `navigate` to open `path` on this origin. `params`
    /// and `from_app=<own id>` are added to the URL; the bridge does not
    /// navigate itself.
    pub async fn navigate_to_app(&self, path: &str, params: &[(&str, &str)]) -> bool {
        let url = match self.app_url(path, params) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot navigate to '{path}': {e}");
                return false;
            }
        };
        let mut payload = Payload::new();
        payload.insert("url".to_string(), Value::String(url.to_string()));
        self.send(actions::NAVIGATE, payload, None).await
    }

    /// Same-origin URL for `path` with `params` and `from_app` appended.
    pub fn app_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let base = self.inner.host.location();
        let mut url = base.join(path)?;
        if url.origin() != base.origin() {
            return Err(BridgeError::InvalidUrl(format!(
                "'{path}' is not on origin {}",
                base.origin().ascii_serialization()
            )));
        }
        url.set_fragment(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params.iter().filter(|(k, _)| *k != FROM_APP_PARAM) {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(FROM_APP_PARAM, self.app_id());
        }
        Ok(url)
    }

    /// Store `value` under `key` and announce it with `sessionUpdate`.
    /// Returns whether the value was stored.
    pub fn set_session_data(&self, key: &str, value: Value) -> bool {
        if let Err(e) = self.inner.session.set(key, &value) {
            warn!("Failed to store session key '{key}': {e}");
            return false;
        }
        let mut payload = Payload::new();
        payload.insert("key".to_string(), Value::String(key.to_string()));
        payload.insert("value".to_string(), value);
        self.announce(actions::SESSION_UPDATE, payload);
        true
    }

    /// Absent keys and unreadable values both read as `None`.
    pub fn get_session_data(&self, key: &str) -> Option<Value> {
        self.inner.session.get(key)
    }

    /// Remove every session key and announce it with `sessionCleared`.
    pub fn clear_session(&self) -> bool {
        match self.inner.session.clear() {
            Ok(removed) => {
                debug!("Cleared {removed} session key(s)");
                self.announce(actions::SESSION_CLEARED, Payload::new());
                true
            }
            Err(e) => {
                warn!("Failed to clear session: {e}");
                false
            }
        }
    }

    /// Instances whose heartbeat is inside the presence window, this one
    /// included.
    pub fn list_active_apps(&self) -> BTreeSet<String> {
        self.inner.presence.list_active()
    }

    /// Stop background work, resolve waiting sends as `false`, close the
    /// broadcast handle and the inbound stream, and drop this instance's
    /// heartbeat. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.acks.cancel_all();
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut broadcast) = self.inner.broadcast.write() {
            broadcast.take();
        }
        if let Ok(mut inbound) = self.inner.inbound.lock() {
            inbound.take();
        }
        if !self.app_id().is_empty() {
            if let Err(e) = self.inner.presence.retire() {
                warn!("Failed to remove heartbeat for '{}': {e}", self.app_id());
            }
        }
        info!("Instance '{}' disposed", self.app_id());
    }

    fn source(&self) -> Option<String> {
        let id = self.app_id();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn publish_native(&self, message: &Message) -> bool {
        self.inner
            .native
            .attempt(&message.action, &message.payload, &message.id)
    }

    fn publish_web(&self, message: &Message) -> bool {
        if self.inner.broadcast_active {
            return match self.inner.broadcast.read() {
                Ok(guard) => guard.as_ref().is_some_and(|b| b.publish(message)),
                Err(_) => false,
            };
        }
        match self.inner.queue.enqueue(message) {
            Ok(key) => {
                debug!("Message {} queued as {key}", message.id);
                true
            }
            Err(e) => {
                warn!("Failed to enqueue message {}: {e}", message.id);
                false
            }
        }
    }

    /// Publish a notification on the web transport and consume its
    /// acknowledgment in the background.
    fn announce(&self, action: &str, payload: Payload) {
        if self.is_disposed() {
            return;
        }
        let message = Message::new(action, payload, self.source(), None);
        if !self.publish_web(&message) {
            return;
        }
        let bridge = self.clone();
        tokio::spawn(async move {
            bridge.inner.acks.wait(&message.id).await;
        });
    }
}

/// Consume the reserved address-bar parameter: decode it into a `urlData`
/// message and strip it from the host's address. Unparsable data is dropped
/// (and still stripped). JSON that is not an object is wrapped as
/// `{"value": ...}`.
pub fn take_url_data(host: &dyn HostEnvironment) -> Option<Message> {
    let location = host.location();
    let raw = location
        .query_pairs()
        .find(|(k, _)| k == URL_DATA_PARAM)
        .map(|(_, v)| v.into_owned())?;

    let remaining: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(k, _)| k != URL_DATA_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut stripped = location.clone();
    if remaining.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(remaining);
    }
    host.replace_location(stripped);

    let payload = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Payload::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(e) => {
            warn!("Ignoring unreadable '{URL_DATA_PARAM}' parameter: {e}");
            return None;
        }
    };
    Some(Message::synthetic(actions::URL_DATA, payload))
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("app_id", &self.inner.options.app_id)
            .field("mode", &self.inner.options.mode)
            .field("broadcast", &self.inner.broadcast_active)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
