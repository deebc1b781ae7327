//! The `transport` module moves messages between instances.
//!
//! - [`broadcast`]: low-latency fan-out over a named channel, when the
//!   environment offers one.
//! - [`queue`]: the durable, store-backed fallback with ordered draining and
//!   time-based garbage collection.
//! - [`native`]: the custom URL scheme hand-off to a native shell.
//!
//! Both web transports apply the same acceptance rule on receipt: a message
//! is taken if it is untargeted or targeted at the local instance, in which
//! case an acknowledgment is written before it is delivered inbound.

pub mod broadcast;
pub mod native;
pub mod queue;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::ack;
use crate::message::Message;
use crate::persistence::SharedStore;

pub use broadcast::{BroadcastChannel, BroadcastTransport, ChannelProvider, LocalChannelHub, UnavailableChannels};
pub use native::NativeBridge;
pub use queue::{DrainReport, QueueTransport};

/// Sending half of an instance's inbound message stream.
pub type Inbound = UnboundedSender<Message>;

/// Apply the acceptance rule to a received message. Returns whether it was
/// accepted.
pub(crate) fn accept(
    message: Message,
    local_id: &str,
    store: &dyn SharedStore,
    inbound: &Inbound,
) -> bool {
    if !message.is_for(local_id) {
        debug!(
            "{local_id} dropping message {} addressed to {:?}",
            message.id, message.target
        );
        return false;
    }

    if let Err(e) = ack::acknowledge(store, &message.id) {
        warn!("Failed to acknowledge message {}: {e}", message.id);
    }

    let id = message.id.clone();
    if inbound.send(message).is_err() {
        debug!("Inbound stream closed, message {id} not delivered");
    }
    true
}
