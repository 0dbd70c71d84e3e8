//! Background writer task for the socket write half
//!
//! All outbound traffic funnels through one queue so the session never blocks
//! on socket I/O; each write reports its outcome back for failure handling.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{FrameSink, OutboundFrame};
use crate::Result;

/// What a queued frame is for, so its completion can be routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    /// Liveness probe ping
    Probe,
    /// User text message
    Message,
    /// Graceful close frame; the writer stops after sending it
    Shutdown,
}

/// A frame queued for the writer task
pub(crate) struct WriteRequest {
    pub frame: OutboundFrame,
    pub kind: WriteKind,
}

/// Completion report for one queued frame
pub(crate) struct WriteOutcome {
    pub kind: WriteKind,
    pub result: Result<()>,
}

/// Spawn the writer task owning `sink`.
///
/// The task drains `requests` in order and posts a [`WriteOutcome`] per frame.
/// A failed write does not stop the task; only a shutdown frame or the
/// request channel closing does.
pub(crate) fn spawn(
    mut sink: Box<dyn FrameSink>,
    mut requests: mpsc::Receiver<WriteRequest>,
    outcomes: mpsc::UnboundedSender<WriteOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("writer task started");

        while let Some(request) = requests.recv().await {
            let kind = request.kind;
            let result = sink.send(request.frame).await;
            outcomes.send(WriteOutcome { kind, result }).ok();

            if kind == WriteKind::Shutdown {
                break;
            }
        }

        debug!("writer task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct RecordingSink {
        frames: mpsc::UnboundedSender<OutboundFrame>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(crate::SessionError::SendFailed("sink unavailable".into()));
            }
            self.frames.send(frame).ok();
            Ok(())
        }
    }

    #[test]
    fn test_writer_reports_outcomes_and_stops_on_shutdown() {
        tokio_test::block_on(async {
            let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
            let (req_tx, req_rx) = mpsc::channel(8);
            let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
            let fail = Arc::new(AtomicBool::new(false));

            let task = spawn(
                Box::new(RecordingSink { frames: frame_tx, fail: fail.clone() }),
                req_rx,
                outcome_tx,
            );

            req_tx
                .send(WriteRequest { frame: OutboundFrame::Text("hi".into()), kind: WriteKind::Message })
                .await
                .unwrap();
            let outcome = outcome_rx.recv().await.unwrap();
            assert_eq!(outcome.kind, WriteKind::Message);
            assert!(outcome.result.is_ok());
            assert_eq!(frame_rx.recv().await.unwrap(), OutboundFrame::Text("hi".into()));

            fail.store(true, Ordering::SeqCst);
            req_tx
                .send(WriteRequest { frame: OutboundFrame::Text("lost".into()), kind: WriteKind::Message })
                .await
                .unwrap();
            let outcome = outcome_rx.recv().await.unwrap();
            assert!(outcome.result.is_err());

            // A failed write does not kill the task; shutdown does.
            fail.store(false, Ordering::SeqCst);
            req_tx
                .send(WriteRequest { frame: OutboundFrame::Close, kind: WriteKind::Shutdown })
                .await
                .unwrap();
            let outcome = outcome_rx.recv().await.unwrap();
            assert_eq!(outcome.kind, WriteKind::Shutdown);
            task.await.unwrap();
        });
    }
}
