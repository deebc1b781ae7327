//! Session state shared by every instance.
//!
//! Values are JSON under `session:<key>` with no expiry. The store only
//! persists; announcing changes to other instances is the bridge's job.

pub mod store;

pub use store::SessionStore;
