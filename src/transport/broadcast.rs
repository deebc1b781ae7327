//! Broadcast transport
//!
//! A [`ChannelProvider`] stands for the environment capability that opens
//! named fan-out channels. [`LocalChannelHub`] provides them in-process on top
//! of `tokio::sync::broadcast`; [`UnavailableChannels`] models an environment
//! without the capability, which makes the bridge fall back to the durable
//! queue for its whole lifetime.
//!
//! Frames carry the `Message` value itself, so publishing cannot fail on
//! serialization. A channel delivers to every subscriber, including the
//! publisher's own, so each frame is tagged with the publishing handle and
//! receivers skip their own frames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message::Message;
use crate::persistence::SharedStore;
use crate::transport::{Inbound, accept};
use crate::utils::{BridgeError, Result};

/// Default number of frames buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Frame {
    pub origin: Uuid,
    pub message: Message,
}

/// An opened named channel.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    name: String,
    sender: broadcast::Sender<Frame>,
}

impl BroadcastChannel {
    pub fn new(name: &str, sender: broadcast::Sender<Frame>) -> Self {
        Self {
            name: name.to_string(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Environment capability that opens broadcast channels by name.
pub trait ChannelProvider: Send + Sync {
    fn open(&self, name: &str) -> Result<BroadcastChannel>;
}

/// In-process channel provider. Clones share channels, so every instance
/// opening the same name on the same hub talks to the others.
#[derive(Debug, Clone)]
pub struct LocalChannelHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Frame>>>>,
    capacity: usize,
}

impl LocalChannelHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }
}

impl Default for LocalChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelProvider for LocalChannelHub {
    fn open(&self, name: &str) -> Result<BroadcastChannel> {
        let mut channels = self.channels.lock().map_err(|_| BridgeError::ChannelUnavailable {
            name: name.to_string(),
            reason: "channel hub poisoned".to_string(),
        })?;
        let sender = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        Ok(BroadcastChannel::new(name, sender))
    }
}

/// Provider for environments without broadcast support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableChannels;

impl ChannelProvider for UnavailableChannels {
    fn open(&self, name: &str) -> Result<BroadcastChannel> {
        Err(BridgeError::ChannelUnavailable {
            name: name.to_string(),
            reason: "broadcast channels are not supported here".to_string(),
        })
    }
}

/// One instance's handle on the broadcast channel.
#[derive(Debug)]
pub struct BroadcastTransport {
    handle_id: Uuid,
    channel: BroadcastChannel,
}

impl BroadcastTransport {
    /// Try to open the channel once. Unavailability is logged here and
    /// nowhere else; `None` means the caller must use the durable queue.
    pub fn open(provider: &dyn ChannelProvider, name: &str) -> Option<Self> {
        match provider.open(name) {
            Ok(channel) => {
                info!("Broadcast channel '{name}' opened");
                Some(Self {
                    handle_id: Uuid::new_v4(),
                    channel,
                })
            }
            Err(e) => {
                warn!("{e}; falling back to the durable queue");
                None
            }
        }
    }

    /// Fan the message out to every other subscriber. Never blocks.
    ///
    /// Returns `false` only when nobody, not even this handle's own listener,
    /// is subscribed.
    pub fn publish(&self, message: &Message) -> bool {
        let frame = Frame {
            origin: self.handle_id,
            message: message.clone(),
        };
        match self.channel.sender.send(frame) {
            Ok(receivers) => {
                debug!(
                    "Broadcast {} on '{}' to {receivers} subscriber(s)",
                    message.id,
                    self.channel.name()
                );
                true
            }
            Err(_) => {
                warn!("No subscribers on '{}', message {} lost", self.channel.name(), message.id);
                false
            }
        }
    }

    /// Subscribe now and spawn the receive loop for `local_id`.
    pub fn listen(
        &self,
        local_id: String,
        store: Arc<dyn SharedStore>,
        inbound: Inbound,
    ) -> JoinHandle<()> {
        let mut rx = self.channel.sender.subscribe();
        let handle_id = self.handle_id;
        let name = self.channel.name().to_string();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => {
                        handle_frame(frame, handle_id, &local_id, store.as_ref(), &inbound);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{local_id} lagged on '{name}', {skipped} frame(s) skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Receive loop on '{name}' closed for {local_id}");
        })
    }
}

/// Process one received frame. Frames published by `handle_id` itself are
/// ignored. Returns whether the message was accepted.
pub fn handle_frame(
    frame: Frame,
    handle_id: Uuid,
    local_id: &str,
    store: &dyn SharedStore,
    inbound: &Inbound,
) -> bool {
    if frame.origin == handle_id {
        return false;
    }
    accept(frame.message, local_id, store, inbound)
}
