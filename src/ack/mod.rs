//! Acknowledgment tracking
//!
//! Turns a fire-and-forget publish into a bounded-wait send. Receivers write
//! a presence-only marker under `ack:<message id>`; the sender's
//! [`AckTracker`] polls for it, deletes it on first sight and resolves.
//!
//! One attempt only: a missing acknowledgment resolves the wait as
//! [`AckOutcome::TimedOut`] and nothing is re-published. The per-message
//! state still records a retry budget ([`MAX_ATTEMPTS`]) that is not spent;
//! callers that want another try call `send` again.

pub mod tracker;

pub use tracker::{AckOutcome, AckTracker, MAX_ATTEMPTS, PendingAck, acknowledge};

#[cfg(test)]
mod tests;
