//! The `utils` module provides a collection of utility functions and common
//! definitions used across `appbridge`.
//!
//! It centralizes the crate error type, logging setup, and the wall clock
//! shared by every component that stamps or compares timestamps.

pub mod error;
pub mod logging;

pub use error::{BridgeError, Result};

/// Current wall-clock time in milliseconds since the UNIX epoch.
///
/// Every timestamp that crosses the shared store uses this clock so that
/// instances in different processes compare like with like.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
