//! The `error` module defines the error type used within `appbridge`.
//!
//! Lower layers (store backends, codecs, the host environment) return
//! [`Result`]. The public [`Bridge`](crate::bridge::Bridge) facade never
//! hands these to callers: it logs them and collapses them into a boolean
//! or an absent value.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The shared key-value store rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    /// A value could not be serialized for the store or the wire.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored record or incoming payload could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),

    /// The environment does not offer a broadcast channel.
    #[error("broadcast channel '{name}' unavailable: {reason}")]
    ChannelUnavailable { name: String, reason: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The embedding host refused an operation (e.g. attaching a frame).
    #[error("host error: {0}")]
    Host(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sled::Error> for BridgeError {
    fn from(e: sled::Error) -> Self {
        BridgeError::Store(e.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(e: url::ParseError) -> Self {
        BridgeError::InvalidUrl(e.to_string())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(e: config::ConfigError) -> Self {
        BridgeError::Config(e.to_string())
    }
}

impl BridgeError {
    /// True when the error describes an unreadable record rather than an
    /// unreachable store.
    pub fn is_decode(&self) -> bool {
        matches!(self, BridgeError::Decode(_))
    }
}
