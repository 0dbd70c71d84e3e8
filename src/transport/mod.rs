//! # Transport Module
//!
//! This module handles WebSocket communication behind narrow trait seams.
//!
//! ## Components
//!
//! - **Connector / FrameSink / FrameSource**: the socket seam; production
//!   code connects through [`WsConnector`], tests substitute channel-backed
//!   fakes
//! - **Writer**: background task owning the write half, consuming queued
//!   outbound frames and reporting per-frame completion
//! - **TransportConfig**: connect timeout and queue sizing

mod config;
pub(crate) mod writer;
mod ws;

pub use config::TransportConfig;
pub use ws::WsConnector;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::Result;

/// Frames a session can put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Text message payload
    Text(String),
    /// Protocol-level ping carrying an opaque token
    Ping(Vec<u8>),
    /// Close request with the normal-closure code
    Close,
}

/// Frames a session can observe from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Text message payload
    Text(String),
    /// Binary payload; acknowledged and otherwise ignored
    Binary(Vec<u8>),
    /// Protocol-level pong echoing a ping token
    Pong(Vec<u8>),
    /// Close frame from the remote endpoint
    Close,
}

/// Opens a socket to an endpoint, yielding its two halves
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the connect handshake and split the socket for concurrent
    /// send/receive. Returns only once the transport-level handshake has
    /// completed.
    async fn connect(&self, endpoint: &Endpoint)
        -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)>;
}

/// Write half of a socket
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame, flushing it to the wire
    async fn send(&mut self, frame: OutboundFrame) -> Result<()>;
}

/// Read half of a socket
#[async_trait]
pub trait FrameSource: Send {
    /// Next inbound frame. `None` means the stream has ended.
    async fn next(&mut self) -> Option<Result<InboundFrame>>;
}
