//! # Handler Module
//!
//! The capability set a presentation collaborator implements to observe a
//! session. All callbacks are invoked from the session's own serialized
//! context; implementations marshal to their own UI thread if they need one.

/// Presentation-side observer for session activity
///
/// Every method has an empty default body so implementations only override
/// what they display.
pub trait SessionHandler: Send + Sync {
    /// The displayable status line changed
    fn on_status_changed(&self, _status: &str) {}

    /// A text message arrived; `index` increases strictly with arrival order
    fn on_message_received(&self, _text: &str, _index: u64) {}

    /// Whether sending is currently permitted
    fn on_send_enabled_changed(&self, _enabled: bool) {}

    /// Whether closing is currently permitted
    fn on_close_enabled_changed(&self, _enabled: bool) {}

    /// Whether opening is currently permitted
    fn on_open_enabled_changed(&self, _enabled: bool) {}
}

/// Handler that ignores every notification
pub struct NopHandler;

impl SessionHandler for NopHandler {}
