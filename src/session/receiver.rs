//! The continuously-rearmed receive loop
//!
//! One receive request is outstanding for the whole life of the socket: each
//! completed receive is forwarded to the driver *before* it is processed, so
//! the loop is already awaiting the next frame while the previous one is
//! handled. A frame arriving between completion and rearm cannot be dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::event::{Input, SessionEvent};
use crate::transport::FrameSource;

/// Spawn the receive loop over `source`.
///
/// The cancellation flag is checked before every rearm; a completion that
/// lands after cancellation is discarded rather than rearmed, so a stale
/// receive can never revive a dead connection.
pub(crate) fn spawn(
    mut source: Box<dyn FrameSource>,
    cancelled: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<Input>,
    attempt: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("receive loop started");

        loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            let item = source.next().await;

            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            let event = match item {
                Some(Ok(frame)) => SessionEvent::FrameReceived { attempt, frame },
                Some(Err(error)) => SessionEvent::ReceiveFailed { attempt, error },
                None => {
                    events
                        .send(Input::Event(SessionEvent::StreamEnded { attempt }))
                        .ok();
                    break;
                }
            };

            if events.send(Input::Event(event)).is_err() {
                break;
            }
        }

        debug!("receive loop stopped");
    })
}
