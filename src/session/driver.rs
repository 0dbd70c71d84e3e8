//! Session driver: the serialized execution context
//!
//! Every completion that can touch session state (connect outcomes, probe
//! replies, receive results, write completions, the status-revert timer)
//! arrives here through one channel or one timer branch of a single select
//! loop. Nothing else mutates [`ConnectionState`] or the message log, so no
//! two transitions or log appends can interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::event::{Input, SessionCommand, SessionEvent};
use super::probe::ProbeState;
use super::receiver;
use super::{ConnectionState, OutboundMessage, SessionConfig, SessionStats};
use crate::endpoint::Endpoint;
use crate::handler::SessionHandler;
use crate::status::{state_message, FailureKind, StatusReporter};
use crate::transport::writer::{self, WriteKind, WriteOutcome, WriteRequest};
use crate::transport::{Connector, FrameSink, FrameSource, InboundFrame, OutboundFrame};
use crate::{Result, SessionError};

/// The at-most-one socket a session holds, bundled with its tasks.
///
/// Created when a connect attempt succeeds, released exactly once on close
/// or fatal failure. Dropping it cancels the receive loop; the writer task
/// stops on its own once the request channel is gone.
struct SocketHandle {
    attempt: u64,
    write_tx: mpsc::Sender<WriteRequest>,
    write_outcomes: mpsc::UnboundedReceiver<WriteOutcome>,
    writer_done: bool,
    cancelled: Arc<AtomicBool>,
    receiver_task: JoinHandle<()>,
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.receiver_task.abort();
    }
}

enum Step {
    Intake(Option<Input>),
    Write(WriteOutcome),
    ProbeExpired,
    Revert,
}

pub(crate) struct Driver {
    endpoint: Endpoint,
    config: SessionConfig,
    handler: Arc<dyn SessionHandler>,
    connector: Arc<dyn Connector>,
    intake: mpsc::UnboundedReceiver<Input>,
    intake_tx: mpsc::UnboundedSender<Input>,
    state: ConnectionState,
    shared_state: Arc<RwLock<ConnectionState>>,
    socket: Option<SocketHandle>,
    /// Bumped per open; tags socket-born events so stale ones are discarded
    attempt: u64,
    probe: ProbeState,
    status: StatusReporter,
    stats: SessionStats,
    shared_stats: Arc<RwLock<SessionStats>>,
}

impl Driver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        endpoint: Endpoint,
        config: SessionConfig,
        handler: Arc<dyn SessionHandler>,
        connector: Arc<dyn Connector>,
        intake: mpsc::UnboundedReceiver<Input>,
        intake_tx: mpsc::UnboundedSender<Input>,
        shared_state: Arc<RwLock<ConnectionState>>,
        shared_stats: Arc<RwLock<SessionStats>>,
    ) -> Self {
        let status = StatusReporter::new(config.status_revert_after);
        Self {
            endpoint,
            config,
            handler,
            connector,
            intake,
            intake_tx,
            state: ConnectionState::Closed,
            shared_state,
            socket: None,
            attempt: 0,
            probe: ProbeState::new(),
            status,
            stats: SessionStats::default(),
            shared_stats,
        }
    }

    pub(crate) async fn run(mut self) {
        self.handler.on_status_changed(state_message(self.state));
        self.announce_capabilities(None);

        loop {
            let probe_deadline = self.probe.deadline();
            let revert_deadline = self.status.revert_deadline();

            let step = tokio::select! {
                biased;
                input = self.intake.recv() => Step::Intake(input),
                outcome = next_write_outcome(&mut self.socket) => Step::Write(outcome),
                _ = sleep_until_opt(probe_deadline) => Step::ProbeExpired,
                _ = sleep_until_opt(revert_deadline) => Step::Revert,
            };

            match step {
                Step::Intake(None) => break,
                Step::Intake(Some(Input::Command(command))) => self.handle_command(command),
                Step::Intake(Some(Input::Event(event))) => self.handle_event(event),
                Step::Write(outcome) => self.handle_write_outcome(outcome),
                Step::ProbeExpired => self.handle_probe_timeout(),
                Step::Revert => {
                    // Re-read the state as it is *now*; it may have changed
                    // while the failure was on display.
                    let text = self.status.revert(self.state);
                    self.handler.on_status_changed(text);
                }
            }

            *self.shared_stats.write() = self.stats.clone();
        }

        debug!("session driver stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Open => self.open(),
            SessionCommand::Close => self.close(),
            SessionCommand::Send(raw) => self.send(raw),
        }
    }

    fn open(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!("open ignored while {:?}", self.state);
            return;
        }

        self.attempt += 1;
        let attempt = self.attempt;
        info!("opening connection to {}", self.endpoint);
        self.transition(ConnectionState::Opening);

        let connector = Arc::clone(&self.connector);
        let endpoint = self.endpoint.clone();
        let events = self.intake_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect(&endpoint).await;
            events
                .send(Input::Event(SessionEvent::ConnectFinished { attempt, result }))
                .ok();
        });
    }

    fn close(&mut self) {
        match self.state {
            ConnectionState::Closed | ConnectionState::Closing => {
                debug!("close ignored while {:?}", self.state);
            }
            ConnectionState::Opening => {
                // No socket exists yet; the late connect result is discarded
                // by its attempt tag.
                info!("close requested during connect; abandoning attempt");
                self.transition(ConnectionState::Closed);
            }
            ConnectionState::Probing | ConnectionState::Established => {
                info!("closing connection");
                self.probe.clear();
                self.transition(ConnectionState::Closing);
                self.enqueue_write(OutboundFrame::Close, WriteKind::Shutdown);
            }
        }
    }

    fn send(&mut self, raw: String) {
        let message = match OutboundMessage::new(&raw) {
            Ok(message) => message,
            Err(e) => {
                debug!("rejecting outbound message: {}", e);
                return;
            }
        };

        if self.state != ConnectionState::Established {
            warn!(
                "send rejected while {:?}: {}",
                self.state,
                SessionError::NotEstablished
            );
            self.fail(FailureKind::NotEstablished);
            return;
        }

        self.enqueue_write(OutboundFrame::Text(message.into_text()), WriteKind::Message);
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ConnectFinished { attempt, result } => {
                self.on_connect_finished(attempt, result)
            }
            SessionEvent::FrameReceived { attempt, frame } => self.on_frame(attempt, frame),
            SessionEvent::ReceiveFailed { attempt, error } => {
                if self.socket_current(attempt) {
                    warn!("receive failed: {}", error);
                    // The receive loop keeps rearming; only close stops it.
                    self.fail(FailureKind::ReceiveFailed);
                }
            }
            SessionEvent::StreamEnded { attempt } => {
                if self.socket_current(attempt) {
                    info!("socket stream ended");
                    self.finish_close();
                }
            }
        }
    }

    fn on_connect_finished(
        &mut self,
        attempt: u64,
        result: Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)>,
    ) {
        if attempt != self.attempt || self.state != ConnectionState::Opening {
            debug!("discarding stale connect result");
            return;
        }

        match result {
            Ok((sink, source)) => {
                let (write_tx, write_rx) =
                    mpsc::channel(self.config.transport.send_queue_len);
                let (outcome_tx, write_outcomes) = mpsc::unbounded_channel();
                let _writer = writer::spawn(sink, write_rx, outcome_tx);

                let cancelled = Arc::new(AtomicBool::new(false));
                let receiver_task = receiver::spawn(
                    source,
                    Arc::clone(&cancelled),
                    self.intake_tx.clone(),
                    attempt,
                );

                self.socket = Some(SocketHandle {
                    attempt,
                    write_tx,
                    write_outcomes,
                    writer_done: false,
                    cancelled,
                    receiver_task,
                });

                info!("connection open; sending liveness probe");
                self.transition(ConnectionState::Probing);
                let token = self.probe.arm(self.config.probe_timeout);
                self.enqueue_write(OutboundFrame::Ping(token), WriteKind::Probe);
            }
            Err(e) => {
                warn!("connect failed: {}", e);
                self.transition(ConnectionState::Closed);
                self.fail(FailureKind::ProbeFailed);
            }
        }
    }

    fn on_frame(&mut self, attempt: u64, frame: InboundFrame) {
        if !self.socket_current(attempt) {
            debug!("discarding frame from a stale socket");
            return;
        }

        self.stats.frames_received += 1;

        match frame {
            InboundFrame::Text(text) => {
                let index = self.status.record_message(text.clone());
                self.stats.messages_delivered += 1;
                debug!("message {} received ({} bytes)", index, text.len());
                self.handler.on_message_received(&text, index);
            }
            InboundFrame::Binary(data) => {
                debug!("ignoring binary frame ({} bytes)", data.len());
            }
            InboundFrame::Pong(token) => self.on_pong(&token),
            InboundFrame::Close => {
                info!("remote endpoint closed the connection");
                self.finish_close();
            }
        }
    }

    fn on_pong(&mut self, token: &[u8]) {
        if self.state != ConnectionState::Probing {
            debug!("pong outside probing ignored");
            return;
        }

        match self.probe.match_pong(token) {
            Some(rtt) => {
                debug!("liveness confirmed in {:?}", rtt);
                self.stats.last_probe_rtt = Some(rtt);
                self.transition(ConnectionState::Established);
            }
            None => debug!("pong did not answer the outstanding probe"),
        }
    }

    fn handle_write_outcome(&mut self, outcome: WriteOutcome) {
        match (outcome.kind, outcome.result) {
            (WriteKind::Probe, Ok(())) => {
                self.stats.frames_sent += 1;
                debug!("probe ping written; awaiting pong");
            }
            (WriteKind::Probe, Err(e)) => {
                warn!("probe write failed: {}", e);
                self.probe.clear();
                self.fail(FailureKind::ProbeFailed);
            }
            (WriteKind::Message, Ok(())) => {
                self.stats.frames_sent += 1;
                debug!("message delivered");
            }
            (WriteKind::Message, Err(e)) => {
                // Dropped, not retried; the connection stays up.
                warn!("message delivery failed: {}", e);
                self.fail(FailureKind::SendFailed);
            }
            (WriteKind::Shutdown, Ok(())) => {
                self.stats.frames_sent += 1;
                debug!("close frame written; awaiting confirmation");
                if let Some(handle) = &mut self.socket {
                    handle.writer_done = true;
                }
            }
            (WriteKind::Shutdown, Err(e)) => {
                warn!("close frame failed ({}); finishing close", e);
                self.finish_close();
            }
        }
    }

    fn handle_probe_timeout(&mut self) {
        warn!(
            "{}",
            SessionError::ProbeFailed("no reply before the deadline".into())
        );
        self.probe.clear();
        // The session stays open but is never promoted; the caller decides
        // whether to close and retry.
        self.fail(FailureKind::ProbeFailed);
    }

    fn enqueue_write(&mut self, frame: OutboundFrame, kind: WriteKind) {
        let Some(handle) = &self.socket else {
            self.settle_failed_write(kind);
            return;
        };

        if handle
            .write_tx
            .try_send(WriteRequest { frame, kind })
            .is_err()
        {
            warn!("outbound queue rejected {:?} frame", kind);
            self.settle_failed_write(kind);
        }
    }

    /// A frame that never reached the writer gets the same treatment as a
    /// failed write.
    fn settle_failed_write(&mut self, kind: WriteKind) {
        match kind {
            WriteKind::Probe => {
                self.probe.clear();
                self.fail(FailureKind::ProbeFailed);
            }
            WriteKind::Message => self.fail(FailureKind::SendFailed),
            WriteKind::Shutdown => self.finish_close(),
        }
    }

    fn socket_current(&self, attempt: u64) -> bool {
        matches!(&self.socket, Some(handle) if handle.attempt == attempt)
    }

    /// The single teardown point: releases the socket handle exactly once
    /// and stops the receive loop with it.
    fn finish_close(&mut self) {
        let Some(handle) = self.socket.take() else {
            debug!("close already finished");
            return;
        };
        drop(handle);

        self.probe.clear();
        self.transition(ConnectionState::Closed);
        info!("connection closed");
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug!("state {:?} -> {:?}", self.state, next);
        let prev = self.state;
        self.state = next;
        *self.shared_state.write() = next;

        if let Some(text) = self.status.on_state_changed(next) {
            self.handler.on_status_changed(text);
        }
        self.announce_capabilities(Some(prev));
    }

    fn fail(&mut self, kind: FailureKind) {
        let text = self.status.report_failure(kind, Instant::now());
        self.handler.on_status_changed(text);
    }

    fn announce_capabilities(&self, prev: Option<ConnectionState>) {
        let (open_now, close_now, send_now) = capabilities(self.state);
        let before = prev.map(capabilities);

        if before.map(|(o, _, _)| o) != Some(open_now) {
            self.handler.on_open_enabled_changed(open_now);
        }
        if before.map(|(_, c, _)| c) != Some(close_now) {
            self.handler.on_close_enabled_changed(close_now);
        }
        if before.map(|(_, _, s)| s) != Some(send_now) {
            self.handler.on_send_enabled_changed(send_now);
        }
    }
}

/// Which intents a state permits: (open, close, send)
fn capabilities(state: ConnectionState) -> (bool, bool, bool) {
    match state {
        ConnectionState::Closed => (true, false, false),
        ConnectionState::Opening => (false, true, false),
        ConnectionState::Probing => (false, true, false),
        ConnectionState::Established => (false, true, true),
        ConnectionState::Closing => (false, false, false),
    }
}

async fn next_write_outcome(socket: &mut Option<SocketHandle>) -> WriteOutcome {
    loop {
        match socket {
            Some(handle) if !handle.writer_done => {
                match handle.write_outcomes.recv().await {
                    Some(outcome) => return outcome,
                    None => handle.writer_done = true,
                }
            }
            _ => std::future::pending::<()>().await,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
