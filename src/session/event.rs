//! Commands and events funneled through the session driver

use crate::transport::{FrameSink, FrameSource, InboundFrame};
use crate::{Result, SessionError};

/// Caller intents
pub(crate) enum SessionCommand {
    Open,
    Close,
    Send(String),
}

/// Completions posted by transport-side tasks.
///
/// Each socket-born event carries the attempt counter of the socket that
/// produced it; the driver discards events from a socket it no longer owns.
pub(crate) enum SessionEvent {
    /// Connect handshake finished
    ConnectFinished {
        attempt: u64,
        result: Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)>,
    },
    /// One inbound frame arrived
    FrameReceived { attempt: u64, frame: InboundFrame },
    /// One receive request errored; the loop keeps rearming
    ReceiveFailed { attempt: u64, error: SessionError },
    /// The inbound stream ended
    StreamEnded { attempt: u64 },
}

/// Everything the driver consumes, in one ordered channel
pub(crate) enum Input {
    Command(SessionCommand),
    Event(SessionEvent),
}
