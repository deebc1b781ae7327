//! Presence tracking
//!
//! Each live instance refreshes `heartbeat:<app id>` with the current time on
//! a fixed interval. Discovery is a point-in-time snapshot: an id is live
//! while its last heartbeat is younger than the presence window. Stale
//! records from crashed instances stay in the store and simply age out of
//! the result.

pub mod tracker;

pub use tracker::PresenceTracker;
