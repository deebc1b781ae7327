//! The `host` module defines the boundary to the environment embedding an
//! instance: its current address, the ability to rewrite that address, and
//! transient frames used to hand custom-scheme URLs to a native shell.
//!
//! [`HeadlessHost`] is an in-memory implementation for tests, the demo
//! binary, and embeddings without a real page.

pub mod environment;

pub use environment::{FrameId, HeadlessHost, HostEnvironment};

#[cfg(test)]
mod tests;
