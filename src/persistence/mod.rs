//! The `persistence` module provides the shared key-value store every
//! instance coordinates through.
//!
//! The store is process-external and offers no transactions: all queue,
//! acknowledgment, heartbeat and session records live side by side under
//! distinct key prefixes (see [`keys`]). Two backends are provided: an
//! in-memory map for instances living in one process, and `sled` for a
//! durable on-disk store.

pub mod keys;
pub mod sled_store;
pub mod store;

pub use sled_store::SledStore;
pub use store::{MemoryStore, SharedStore};
