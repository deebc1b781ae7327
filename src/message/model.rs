use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::utils::{BridgeError, Result, now_millis};

/// Application-defined structured data attached to a message.
pub type Payload = Map<String, Value>;

/// Actions emitted by the bridge itself.
pub mod actions {
    pub const NAVIGATE: &str = "navigate";
    pub const URL_DATA: &str = "urlData";
    pub const SESSION_UPDATE: &str = "sessionUpdate";
    pub const SESSION_CLEARED: &str = "sessionCleared";
}

/// A message exchanged between instances.
///
/// # Fields
///
/// - `id` - Opaque unique id; acknowledgments are keyed by it.
/// - `action` - Application-defined verb. Not validated.
/// - `payload` - Arbitrary JSON object.
/// - `source` - Sending instance, absent for synthetic messages.
/// - `target` - Intended receiver, absent meaning "everyone".
/// - `timestamp` - Creation time in milliseconds since the UNIX epoch.
///
/// Messages are immutable once created and are cloned, never mutated, when
/// they cross transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub timestamp: i64,
}

impl Message {
    /// Create a message with a fresh id stamped with the current time.
    pub fn new(
        action: impl Into<String>,
        payload: Payload,
        source: Option<String>,
        target: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
            source,
            target,
            timestamp: now_millis(),
        }
    }

    /// Create a system-origin message with no source and no target.
    pub fn synthetic(action: impl Into<String>, payload: Payload) -> Self {
        Self::new(action, payload, None, None)
    }

    /// Acceptance rule shared by every transport: untargeted messages are for
    /// everyone, targeted ones only for the named instance.
    pub fn is_for(&self, local_id: &str) -> bool {
        match &self.target {
            None => true,
            Some(target) => target == local_id,
        }
    }

    pub fn is_from(&self, local_id: &str) -> bool {
        self.source.as_deref() == Some(local_id)
    }
}

/// Durable-queue record: a [`Message`] plus transport metadata.
///
/// `key` is the zero-padded queue key the entry is stored under, `created` the
/// enqueue time used by garbage collection. `origin` identifies the queue
/// handle that wrote the entry, so a handle never consumes its own writes
/// even when the message carries no `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub message: Message,
    pub key: String,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
}

impl QueueEntry {
    pub fn new(message: Message, key: String) -> Self {
        Self {
            message,
            key,
            created: now_millis(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: Uuid) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Serialize a message into its store/wire record.
pub fn encode(message: &Message) -> Result<String> {
    serde_json::to_string(message).map_err(|e| BridgeError::Encode(e.to_string()))
}

/// Parse a record produced by [`encode`] (or by a [`QueueEntry`]).
pub fn decode(record: &str) -> Result<Message> {
    serde_json::from_str(record).map_err(|e| BridgeError::Decode(e.to_string()))
}

impl QueueEntry {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::Encode(e.to_string()))
    }

    pub fn decode(record: &str) -> Result<Self> {
        serde_json::from_str(record).map_err(|e| BridgeError::Decode(e.to_string()))
    }
}
