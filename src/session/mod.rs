//! # Session Module
//!
//! Connection lifecycle management for a single WebSocket session.
//!
//! ## Components
//!
//! - **Session**: the public handle; fire-and-forget open/close/send intents
//! - **Driver**: the serialized event loop owning all session state
//! - **Probe**: liveness confirmation bookkeeping
//! - **Receiver**: the continuously-rearmed receive loop

mod driver;
mod event;
mod probe;
mod receiver;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::consts;
use crate::endpoint::Endpoint;
use crate::handler::SessionHandler;
use crate::transport::{Connector, TransportConfig, WsConnector};
use crate::{util, Result, SessionError};
use driver::Driver;
use event::{Input, SessionCommand};

/// Connection lifecycle states
///
/// A session is promoted to [`Established`](ConnectionState::Established)
/// only after the transport handshake *and* a successful liveness round
/// trip; an open socket with an unresponsive remote never permits sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and none in flight
    #[default]
    Closed,
    /// Transport connect handshake in flight
    Opening,
    /// Socket open; awaiting the liveness probe reply
    Probing,
    /// Liveness confirmed; sends permitted
    Established,
    /// Graceful shutdown requested; awaiting confirmation
    Closing,
}

/// Validated outbound text: non-empty after trimming.
///
/// Constructed per send call and consumed by the transport; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    text: String,
}

impl OutboundMessage {
    /// Trim `raw`, rejecting text that is blank afterwards
    pub fn new(raw: &str) -> Result<Self> {
        match util::normalize_outbound(raw) {
            Some(text) => Ok(Self { text }),
            None => Err(SessionError::EmptyMessage),
        }
    }

    /// The validated text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the message, yielding its text
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Counters for one session handle
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Frames successfully written
    pub frames_sent: u64,
    /// Frames observed from the wire
    pub frames_received: u64,
    /// Text messages delivered to the handler
    pub messages_delivered: u64,
    /// Round-trip time of the most recent successful liveness probe
    pub last_probe_rtt: Option<Duration>,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for the liveness probe reply
    pub probe_timeout: Duration,
    /// How long a transient failure stays on display
    pub status_revert_after: Duration,
    /// Transport-level configuration
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(consts::DEFAULT_PROBE_TIMEOUT),
            status_revert_after: Duration::from_millis(consts::DEFAULT_STATUS_REVERT),
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Set the probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the failure display window
    pub fn with_status_revert_after(mut self, window: Duration) -> Self {
        self.status_revert_after = window;
        self
    }

    /// Set the transport configuration
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// Handle to one WebSocket session.
///
/// All intents return immediately; outcomes surface through the injected
/// [`SessionHandler`]. The handle can be shared freely across tasks; state
/// mutation happens on the session's own driver task, never on the caller.
///
/// Dropping the handle tears the session down.
pub struct Session {
    intake: mpsc::UnboundedSender<Input>,
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<RwLock<SessionStats>>,
    driver_task: JoinHandle<()>,
}

impl Session {
    /// Create a session for `endpoint` with default configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(endpoint: Endpoint, handler: Arc<dyn SessionHandler>) -> Self {
        Self::with_config(endpoint, handler, SessionConfig::default())
    }

    /// Create a session with explicit configuration
    pub fn with_config(
        endpoint: Endpoint,
        handler: Arc<dyn SessionHandler>,
        config: SessionConfig,
    ) -> Self {
        let connector = Arc::new(WsConnector::new(config.transport.clone()));
        Self::with_connector(endpoint, handler, config, connector)
    }

    /// Create a session over a custom [`Connector`]
    pub fn with_connector(
        endpoint: Endpoint,
        handler: Arc<dyn SessionHandler>,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(ConnectionState::Closed));
        let stats = Arc::new(RwLock::new(SessionStats::default()));

        let driver = Driver::new(
            endpoint,
            config,
            handler,
            connector,
            intake_rx,
            intake_tx.clone(),
            Arc::clone(&state),
            Arc::clone(&stats),
        );
        let driver_task = tokio::spawn(driver.run());

        Self {
            intake: intake_tx,
            state,
            stats,
            driver_task,
        }
    }

    /// Request the connection be opened. No-op unless the session is Closed.
    pub fn request_open(&self) {
        self.intake.send(Input::Command(SessionCommand::Open)).ok();
    }

    /// Request a graceful close. No-op if already Closed or Closing.
    pub fn request_close(&self) {
        self.intake.send(Input::Command(SessionCommand::Close)).ok();
    }

    /// Request `raw` be sent as a text message.
    ///
    /// The text is trimmed; empty input is rejected outright. Sending while
    /// not Established surfaces a transient failure instead of touching the
    /// transport.
    pub fn request_send(&self, raw: impl Into<String>) {
        self.intake
            .send(Input::Command(SessionCommand::Send(raw.into())))
            .ok();
    }

    /// Snapshot of the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SessionStats {
        self.stats.read().clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.driver_task.abort();
    }
}
