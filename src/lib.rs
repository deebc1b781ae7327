//! # appbridge
//!
//! `appbridge` lets independent application instances that share a store
//! exchange structured messages, discover each other, and share small pieces
//! of session state.
//!
//! ## Core Modules
//!
//! - `bridge`: The public facade. Chooses a transport per send and waits for acknowledgment.
//! - `message`: The message model and its record format.
//! - `transport`: Broadcast channel, durable queue and native scheme bridge.
//! - `ack`: Waits for receivers' acknowledgment markers.
//! - `presence`: Heartbeats and liveness-based discovery.
//! - `session`: Namespaced key-value state shared by all instances.
//! - `persistence`: The shared key-value store (in-memory or `sled`).
//! - `host`: The environment embedding an instance (address, transient frames).
//! - `config`: Loading settings from files and environment variables.
//! - `utils`: Error type, logging setup and the wall clock.

pub mod ack;
pub mod bridge;
pub mod config;
pub mod host;
pub mod message;
pub mod persistence;
pub mod presence;
pub mod session;
pub mod transport;
pub mod utils;

pub use bridge::{Bridge, BridgeOptions, TransportMode};
pub use message::{Message, Payload};
pub use utils::{BridgeError, Result};
