//! # wsession
//!
//! Client-side session management for a single persistent WebSocket
//! connection: open it, verify liveness with a protocol ping, exchange text
//! messages, and surface transient failures through a bounded status display.
//!
//! ## Architecture
//!
//! The crate is organized into the following layers:
//!
//! - **Session Layer**: Connection lifecycle state machine, liveness probing,
//!   the continuously-rearmed receive loop
//! - **Status Layer**: Displayable status derivation with timed failure
//!   overrides, ordered inbound-message log
//! - **Transport Layer**: WebSocket connect/send/receive behind narrow trait
//!   seams, with a background writer task
//! - **Endpoint Layer**: Validated, immutable connection target
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsession::{Endpoint, NopHandler, Session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoint = Endpoint::new("wss://echo.example.net/socket").unwrap();
//!     let session = Session::new(endpoint, Arc::new(NopHandler));
//!
//!     session.request_open();
//!     // ... once established:
//!     session.request_send("hello");
//!     session.request_close();
//! }
//! ```

pub mod endpoint;
pub mod handler;
pub mod session;
pub mod status;
pub mod transport;
pub mod util;

// Re-export commonly used types
pub use endpoint::Endpoint;
pub use handler::{NopHandler, SessionHandler};
pub use session::{ConnectionState, OutboundMessage, Session, SessionConfig, SessionStats};
pub use status::log::{InboundMessage, MessageLog};
pub use status::{state_message, FailureKind, StatusReporter};
pub use transport::{
    Connector, FrameSink, FrameSource, InboundFrame, OutboundFrame, TransportConfig, WsConnector,
};
pub use util::{init_logging, SessionSettings};

/// Error types for the session framework
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SessionError {
        #[error("transport error: {0}")]
        Transport(#[from] tokio_tungstenite::tungstenite::Error),

        #[error("connection is not established")]
        NotEstablished,

        #[error("liveness probe failed: {0}")]
        ProbeFailed(String),

        #[error("send failed: {0}")]
        SendFailed(String),

        #[error("receive failed: {0}")]
        ReceiveFailed(String),

        #[error("invalid endpoint: {0}")]
        InvalidEndpoint(String),

        #[error("message is empty after trimming")]
        EmptyMessage,

        #[error("configuration error: {0}")]
        Config(String),

        #[error("timeout error: operation timed out after {0}ms")]
        Timeout(u64),
    }

    pub type Result<T> = std::result::Result<T, SessionError>;
}

pub use error::{Result, SessionError};

/// Constants used throughout the framework
pub mod consts {
    /// Status display strings, one per connection state
    pub const STATUS_CLOSED: &str = "Connection is Closed.";
    pub const STATUS_OPENING: &str = "Opening connection...";
    pub const STATUS_PROBING: &str = "Verifying connection...";
    pub const STATUS_ESTABLISHED: &str = "Connection is Open.";
    pub const STATUS_CLOSING: &str = "Closing connection...";

    /// Status display strings, one per transient failure kind
    pub const STATUS_PROBE_FAILED: &str = "Unable to send ping";
    pub const STATUS_SEND_FAILED: &str = "Unable to send message";
    pub const STATUS_RECEIVE_FAILED: &str = "Unable to receive message";
    pub const STATUS_NOT_ESTABLISHED: &str = "Connection is not established";

    /// Default timeouts (milliseconds)
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 3000;
    pub const DEFAULT_PROBE_TIMEOUT: u64 = 5000;

    /// How long a transient failure stays on display before the true
    /// state is shown again (milliseconds)
    pub const DEFAULT_STATUS_REVERT: u64 = 4000;

    /// Outbound frame queue length
    pub const DEFAULT_SEND_QUEUE_LEN: usize = 64;
}
