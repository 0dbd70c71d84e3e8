//! # Status Module
//!
//! Derives the single user-visible status line from session state, with
//! timed overrides for transient failures, and owns the ordered log of
//! received messages.

pub mod log;

use tokio::time::Instant;

use crate::consts;
use crate::session::ConnectionState;
use log::MessageLog;

/// Non-fatal failures surfaced through the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The liveness probe did not succeed
    ProbeFailed,
    /// An outbound message could not be delivered
    SendFailed,
    /// An inbound read errored
    ReceiveFailed,
    /// An operation was attempted out of state
    NotEstablished,
}

impl FailureKind {
    /// Display string for this failure
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::ProbeFailed => consts::STATUS_PROBE_FAILED,
            FailureKind::SendFailed => consts::STATUS_SEND_FAILED,
            FailureKind::ReceiveFailed => consts::STATUS_RECEIVE_FAILED,
            FailureKind::NotEstablished => consts::STATUS_NOT_ESTABLISHED,
        }
    }
}

/// Display string for a connection state
pub fn state_message(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Closed => consts::STATUS_CLOSED,
        ConnectionState::Opening => consts::STATUS_OPENING,
        ConnectionState::Probing => consts::STATUS_PROBING,
        ConnectionState::Established => consts::STATUS_ESTABLISHED,
        ConnectionState::Closing => consts::STATUS_CLOSING,
    }
}

struct FailureOverride {
    kind: FailureKind,
    expires_at: Instant,
}

/// Translates state and transient failures into the displayed status.
///
/// The display is either the current state's message, or a failure message
/// held for a fixed window. Only one override is ever pending: a new failure
/// resets the expiry instead of stacking. When the window ends the reporter
/// re-reads the state *at that moment*, never a snapshot captured when the
/// failure happened.
pub struct StatusReporter {
    revert_after: std::time::Duration,
    active: Option<FailureOverride>,
    log: MessageLog,
}

impl StatusReporter {
    /// Create a reporter with the given override window
    pub fn new(revert_after: std::time::Duration) -> Self {
        Self {
            revert_after,
            active: None,
            log: MessageLog::new(),
        }
    }

    /// Record a transient failure at `now`; returns the text to display
    pub fn report_failure(&mut self, kind: FailureKind, now: Instant) -> &'static str {
        self.active = Some(FailureOverride {
            kind,
            expires_at: now + self.revert_after,
        });
        kind.message()
    }

    /// Whether a failure override is currently on display
    pub fn has_override(&self) -> bool {
        self.active.is_some()
    }

    /// Kind of the pending override, if any
    pub fn override_kind(&self) -> Option<FailureKind> {
        self.active.as_ref().map(|o| o.kind)
    }

    /// When the pending override expires, if any
    pub fn revert_deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|o| o.expires_at)
    }

    /// End the override window; returns the text for the state current now
    pub fn revert(&mut self, state: ConnectionState) -> &'static str {
        self.active = None;
        state_message(state)
    }

    /// Text for a state transition, or `None` while an override holds the
    /// display (the revert will pick up the new state)
    pub fn on_state_changed(&self, state: ConnectionState) -> Option<&'static str> {
        if self.active.is_some() {
            None
        } else {
            Some(state_message(state))
        }
    }

    /// Record a received message in the log, returning its sequence index
    pub fn record_message(&mut self, text: impl Into<String>) -> u64 {
        self.log.record(text)
    }

    /// The received-message log, newest first
    pub fn log(&self) -> &MessageLog {
        &self.log
    }
}
