use std::time::Duration;

use serde::Deserialize;

use crate::bridge::TransportMode;

/// Top-level configuration settings for an instance.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub bridge: BridgeSettings,
    pub timing: TimingSettings,
    pub storage: StorageSettings,
}

/// Identity and routing of this instance.
///
/// `origin` is the address used when the host does not provide one, and the
/// base for same-origin navigation URLs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BridgeSettings {
    pub app_id: String,
    pub mode: TransportMode,
    pub url_scheme: String,
    pub channel_name: String,
    pub origin: String,
}

/// Process-wide timing constants, all in milliseconds.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimingSettings {
    pub ack_timeout_ms: u64,
    pub ack_poll_ms: u64,
    pub queue_poll_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub presence_window_ms: u64,
    pub queue_retention_ms: u64,
    pub frame_linger_ms: u64,
}

impl TimingSettings {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn ack_poll(&self) -> Duration {
        Duration::from_millis(self.ack_poll_ms.max(1))
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn frame_linger(&self) -> Duration {
        Duration::from_millis(self.frame_linger_ms)
    }
}

/// Where the shared store lives. No path means an in-memory store.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct StorageSettings {
    pub path: Option<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub bridge: Option<PartialBridgeSettings>,
    pub timing: Option<PartialTimingSettings>,
    pub storage: Option<StorageSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBridgeSettings {
    pub app_id: Option<String>,
    pub mode: Option<TransportMode>,
    pub url_scheme: Option<String>,
    pub channel_name: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialTimingSettings {
    pub ack_timeout_ms: Option<u64>,
    pub ack_poll_ms: Option<u64>,
    pub queue_poll_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub presence_window_ms: Option<u64>,
    pub queue_retention_ms: Option<u64>,
    pub frame_linger_ms: Option<u64>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let bridge = match self.bridge {
            Some(b) => BridgeSettings {
                app_id: b.app_id.unwrap_or(default.bridge.app_id),
                mode: b.mode.unwrap_or(default.bridge.mode),
                url_scheme: b.url_scheme.unwrap_or(default.bridge.url_scheme),
                channel_name: b.channel_name.unwrap_or(default.bridge.channel_name),
                origin: b.origin.unwrap_or(default.bridge.origin),
            },
            None => default.bridge,
        };

        let timing = match self.timing {
            Some(t) => {
                let d = default.timing;
                TimingSettings {
                    ack_timeout_ms: t.ack_timeout_ms.unwrap_or(d.ack_timeout_ms),
                    ack_poll_ms: t.ack_poll_ms.unwrap_or(d.ack_poll_ms),
                    queue_poll_ms: t.queue_poll_ms.unwrap_or(d.queue_poll_ms),
                    heartbeat_interval_ms: t
                        .heartbeat_interval_ms
                        .unwrap_or(d.heartbeat_interval_ms),
                    presence_window_ms: t.presence_window_ms.unwrap_or(d.presence_window_ms),
                    queue_retention_ms: t.queue_retention_ms.unwrap_or(d.queue_retention_ms),
                    frame_linger_ms: t.frame_linger_ms.unwrap_or(d.frame_linger_ms),
                }
            }
            None => default.timing,
        };

        Settings {
            bridge,
            timing,
            storage: self.storage.unwrap_or(default.storage),
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 5_000,
            ack_poll_ms: 100,
            queue_poll_ms: 100,
            heartbeat_interval_ms: 5_000,
            presence_window_ms: 10_000,
            queue_retention_ms: 5 * 60 * 1_000,
            frame_linger_ms: 100,
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            bridge: BridgeSettings {
                app_id: String::new(),
                mode: TransportMode::Auto,
                url_scheme: "appbridge".to_string(),
                channel_name: "appbridge".to_string(),
                origin: "http://localhost/".to_string(),
            },
            timing: TimingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}
