//! Native bridge
//!
//! Hands a message to a native shell by loading
//! `<scheme>://<action>?data=<url-encoded JSON>&id=<message id>` in a
//! transient frame. The shell is expected to write the acknowledgment for
//! `id` back into the shared store; the bridge itself cannot tell whether a
//! handler exists, so an attached frame counts as success.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::host::HostEnvironment;
use crate::message::Payload;
use crate::utils::{BridgeError, Result};

pub struct NativeBridge {
    scheme: String,
    host: Arc<dyn HostEnvironment>,
    linger: Duration,
}

impl NativeBridge {
    pub fn new(scheme: &str, host: Arc<dyn HostEnvironment>, linger: Duration) -> Self {
        Self {
            scheme: scheme.to_string(),
            host,
            linger,
        }
    }

    pub fn scheme_url(&self, action: &str, payload: &Payload, message_id: &str) -> Result<Url> {
        let data = serde_json::to_string(payload).map_err(|e| BridgeError::Encode(e.to_string()))?;
        let raw = format!(
            "{}://{}?data={}&id={}",
            self.scheme,
            urlencoding::encode(action),
            urlencoding::encode(&data),
            urlencoding::encode(message_id),
        );
        Ok(Url::parse(&raw)?)
    }

    /// Load the scheme URL in a frame that is detached again after the linger
    /// delay. Must be called from within a Tokio runtime.
    pub fn attempt(&self, action: &str, payload: &Payload, message_id: &str) -> bool {
        let url = match self.scheme_url(action, payload, message_id) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot build native URL for '{action}': {e}");
                return false;
            }
        };

        let frame = match self.host.attach_frame(&url) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Native hand-off of '{action}' failed: {e}");
                return false;
            }
        };
        debug!("Native hand-off {url}");

        let host = self.host.clone();
        let linger = self.linger;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            host.detach_frame(frame);
        });
        true
    }
}

impl std::fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBridge")
            .field("scheme", &self.scheme)
            .field("linger", &self.linger)
            .finish()
    }
}
