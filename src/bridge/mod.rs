//! Bridge facade
//!
//! [`Bridge`] is the public surface of an instance. It wires the transports,
//! acknowledgment tracker, presence tracker and session store together and
//! picks the transport for every send:
//!
//! | mode   | target | attempted                                  |
//! |--------|--------|--------------------------------------------|
//! | native | any    | native bridge only                         |
//! | web    | any    | web transport only                         |
//! | auto   | none   | native bridge, web transport if that fails |
//! | auto   | some   | web transport only                         |
//!
//! The web transport is the broadcast channel when it opened at
//! initialization, the durable queue otherwise. A successful publish is
//! followed by a bounded wait for the acknowledgment; callers only ever see
//! `true` or `false`.
//!
//! A `Bridge` is a cheap handle (`Clone`); there is no global instance.

pub mod engine;
pub mod mode;

pub use engine::{Bridge, BridgeOptions, FROM_APP_PARAM, URL_DATA_PARAM, take_url_data};
pub use mode::TransportMode;

#[cfg(test)]
mod tests;
