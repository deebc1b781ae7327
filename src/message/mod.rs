//! The `message` module defines the unit of communication between instances
//! and its record format in the shared store.
//!
//! Records are JSON. Decoding is lenient: `source` and `target` may be
//! missing, a missing payload decodes as an empty map, and unknown fields are
//! ignored so that a [`QueueEntry`] record also decodes as a plain
//! [`Message`].

pub mod model;

pub use model::{Message, Payload, QueueEntry, actions, decode, encode};
