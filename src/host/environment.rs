use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::utils::{BridgeError, Result};

/// Handle to a transient frame attached by [`HostEnvironment::attach_frame`].
pub type FrameId = u64;

/// The page (or page-like shell) an instance runs in.
pub trait HostEnvironment: Send + Sync {
    /// Current address of the instance.
    fn location(&self) -> Url;

    /// Rewrite the visible address without navigating.
    fn replace_location(&self, url: Url);

    /// Attach an invisible frame that loads `url`. Loading a custom-scheme URL
    /// is what hands it to the native shell; whether a handler exists cannot
    /// be observed.
    fn attach_frame(&self, url: &Url) -> Result<FrameId>;

    fn detach_frame(&self, id: FrameId);
}

#[derive(Debug)]
struct HostState {
    location: Url,
    frames: BTreeMap<FrameId, Url>,
    launched: Vec<Url>,
    refuse_frames: bool,
}

/// In-memory host. Clones share state.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    state: Arc<Mutex<HostState>>,
    next_frame: Arc<AtomicU64>,
}

impl HeadlessHost {
    pub fn new(location: Url) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                location,
                frames: BTreeMap::new(),
                launched: Vec::new(),
                refuse_frames: false,
            })),
            next_frame: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn parse(location: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(location)?))
    }

    /// Every URL ever loaded through a frame, in order.
    pub fn launched(&self) -> Vec<Url> {
        self.state
            .lock()
            .map(|s| s.launched.clone())
            .unwrap_or_default()
    }

    /// Number of frames currently attached.
    pub fn attached_frames(&self) -> usize {
        self.state.lock().map(|s| s.frames.len()).unwrap_or(0)
    }

    /// Make subsequent `attach_frame` calls fail, as a page without a
    /// document body would.
    pub fn refuse_frames(&self, refuse: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.refuse_frames = refuse;
        }
    }
}

impl HostEnvironment for HeadlessHost {
    fn location(&self) -> Url {
        match self.state.lock() {
            Ok(s) => s.location.clone(),
            Err(poisoned) => poisoned.into_inner().location.clone(),
        }
    }

    fn replace_location(&self, url: Url) {
        if let Ok(mut s) = self.state.lock() {
            tracing::debug!("Location replaced with {url}");
            s.location = url;
        }
    }

    fn attach_frame(&self, url: &Url) -> Result<FrameId> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| BridgeError::Host("host state poisoned".to_string()))?;
        if s.refuse_frames {
            return Err(BridgeError::Host("frame attachment refused".to_string()));
        }
        let id = self.next_frame.fetch_add(1, Ordering::SeqCst);
        s.frames.insert(id, url.clone());
        s.launched.push(url.clone());
        Ok(id)
    }

    fn detach_frame(&self, id: FrameId) {
        if let Ok(mut s) = self.state.lock() {
            s.frames.remove(&id);
        }
    }
}
