//! Lifecycle tests driving the session through a scripted connector.
//!
//! The connector hands out channel-backed sockets, so every transport
//! completion is injected deterministically: written frames are observable,
//! inbound frames and errors are scripted, and the clock is paused where a
//! timer matters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use wsession::{
    ConnectionState, Connector, Endpoint, FrameSink, FrameSource, InboundFrame, OutboundFrame,
    Result, Session, SessionConfig, SessionError, SessionHandler,
};

struct SocketScript {
    sink_tx: mpsc::UnboundedSender<OutboundFrame>,
    source_rx: mpsc::UnboundedReceiver<Result<InboundFrame>>,
    fail_writes: Arc<AtomicBool>,
}

/// Test-side controls for one scripted socket
struct SocketControls {
    inbound: mpsc::UnboundedSender<Result<InboundFrame>>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    fail_writes: Arc<AtomicBool>,
}

impl SocketControls {
    fn inject(&self, frame: InboundFrame) {
        self.inbound.send(Ok(frame)).ok();
    }

    fn inject_error(&self) {
        self.inbound
            .send(Err(SessionError::ReceiveFailed("scripted read error".into())))
            .ok();
    }

    /// Drain every frame written so far
    fn written(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

#[derive(Default)]
struct MockConnector {
    scripts: Mutex<VecDeque<SocketScript>>,
    connects: AtomicUsize,
    stalled: AtomicBool,
}

impl MockConnector {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one socket for the next connect; returns its controls
    fn expect_socket(&self) -> SocketControls {
        let (sink_tx, outbound) = mpsc::unbounded_channel();
        let (inbound, source_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));
        self.scripts.lock().push_back(SocketScript {
            sink_tx,
            source_rx,
            fail_writes: Arc::clone(&fail_writes),
        });
        SocketControls {
            inbound,
            outbound,
            fail_writes,
        }
    }

    /// Make every subsequent connect hang forever
    fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

struct MockSink {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SessionError::SendFailed("scripted write failure".into()));
        }
        self.tx
            .send(frame)
            .map_err(|_| SessionError::SendFailed("sink closed".into()))
    }
}

struct MockSource {
    rx: mpsc::UnboundedReceiver<Result<InboundFrame>>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next(&mut self) -> Option<Result<InboundFrame>> {
        self.rx.recv().await
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| SessionError::Config("no scripted socket".into()))?;
        Ok((
            Box::new(MockSink {
                tx: script.sink_tx,
                fail: script.fail_writes,
            }),
            Box::new(MockSource {
                rx: script.source_rx,
            }),
        ))
    }
}

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<String>>,
    messages: Mutex<Vec<(String, u64)>>,
    open_enabled: Mutex<Vec<bool>>,
    close_enabled: Mutex<Vec<bool>>,
    send_enabled: Mutex<Vec<bool>>,
}

impl SessionHandler for Recorder {
    fn on_status_changed(&self, status: &str) {
        self.statuses.lock().push(status.to_string());
    }
    fn on_message_received(&self, text: &str, index: u64) {
        self.messages.lock().push((text.to_string(), index));
    }
    fn on_send_enabled_changed(&self, enabled: bool) {
        self.send_enabled.lock().push(enabled);
    }
    fn on_close_enabled_changed(&self, enabled: bool) {
        self.close_enabled.lock().push(enabled);
    }
    fn on_open_enabled_changed(&self, enabled: bool) {
        self.open_enabled.lock().push(enabled);
    }
}

impl Recorder {
    fn last_status(&self) -> String {
        self.statuses.lock().last().cloned().unwrap_or_default()
    }

    fn messages(&self) -> Vec<(String, u64)> {
        self.messages.lock().clone()
    }

    fn send_enabled_now(&self) -> bool {
        self.send_enabled.lock().last().copied().unwrap_or(false)
    }

    fn open_enabled_now(&self) -> bool {
        self.open_enabled.lock().last().copied().unwrap_or(false)
    }

    fn status_count(&self, text: &str) -> usize {
        self.statuses
            .lock()
            .iter()
            .filter(|s| s.as_str() == text)
            .count()
    }
}

fn endpoint() -> Endpoint {
    Endpoint::new("wss://example.test/socket").unwrap()
}

fn build(
    connector: &Arc<MockConnector>,
    config: SessionConfig,
) -> (Session, Arc<Recorder>) {
    let handler = Arc::new(Recorder::default());
    let observer: Arc<dyn SessionHandler> = handler.clone();
    let session = Session::with_connector(endpoint(), observer, config, connector.clone());
    (session, handler)
}

/// Let every spawned task drain its queues (single-threaded test runtime)
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Open the session and answer the liveness probe
async fn establish(session: &Session, socket: &mut SocketControls) {
    session.request_open();
    settle().await;

    let frames = socket.written();
    let token = match frames.as_slice() {
        [OutboundFrame::Ping(token)] => token.clone(),
        other => panic!("expected exactly one probe ping, got {:?}", other),
    };

    socket.inject(InboundFrame::Pong(token));
    settle().await;
    assert_eq!(session.state(), ConnectionState::Established);
}

#[tokio::test]
async fn test_open_probe_establishes() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());

    assert_eq!(session.state(), ConnectionState::Closed);

    session.request_open();
    settle().await;
    // Transport open alone is not enough to permit sends.
    assert_eq!(session.state(), ConnectionState::Probing);
    assert!(!handler.send_enabled_now());

    let frames = socket.written();
    let token = match frames.as_slice() {
        [OutboundFrame::Ping(token)] => token.clone(),
        other => panic!("expected exactly one probe ping, got {:?}", other),
    };

    socket.inject(InboundFrame::Pong(token));
    settle().await;

    assert_eq!(session.state(), ConnectionState::Established);
    assert_eq!(handler.last_status(), "Connection is Open.");
    assert!(handler.send_enabled_now());
    assert_eq!(connector.connect_count(), 1);
    assert!(session.stats().last_probe_rtt.is_some());
}

#[tokio::test]
async fn test_send_outside_established_touches_nothing() {
    let connector = MockConnector::new();
    let (session, handler) = build(&connector, SessionConfig::default());

    session.request_send("hello");
    settle().await;

    assert_eq!(connector.connect_count(), 0);
    assert!(handler.messages().is_empty());
    assert_eq!(handler.last_status(), "Connection is not established");
    assert_eq!(session.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_empty_send_is_rejected_silently() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    session.request_send("   ");
    settle().await;

    assert!(socket.written().is_empty());
    assert_eq!(handler.last_status(), "Connection is Open.");
}

#[tokio::test]
async fn test_open_while_active_is_noop() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, _handler) = build(&connector, SessionConfig::default());

    session.request_open();
    settle().await;
    assert_eq!(session.state(), ConnectionState::Probing);

    // A second open while the probe is pending must not allocate a socket.
    session.request_open();
    settle().await;
    assert_eq!(connector.connect_count(), 1);

    let token = match socket.written().as_slice() {
        [OutboundFrame::Ping(token)] => token.clone(),
        other => panic!("expected one ping, got {:?}", other),
    };
    socket.inject(InboundFrame::Pong(token));
    settle().await;
    assert_eq!(session.state(), ConnectionState::Established);

    session.request_open();
    settle().await;
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn test_messages_arrive_in_order_with_increasing_indices() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.inject(InboundFrame::Text("a".into()));
    socket.inject(InboundFrame::Binary(vec![1, 2, 3]));
    socket.inject(InboundFrame::Text("b".into()));
    socket.inject(InboundFrame::Text("c".into()));
    settle().await;

    // Binary frames are acknowledged but never delivered.
    assert_eq!(
        handler.messages(),
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2)
        ]
    );
    assert_eq!(session.stats().messages_delivered, 3);
}

#[tokio::test]
async fn test_send_delivers_without_touching_received_log() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    session.request_send("hello");
    settle().await;

    assert_eq!(socket.written(), vec![OutboundFrame::Text("hello".into())]);
    assert!(handler.messages().is_empty());

    socket.inject(InboundFrame::Text("hi".into()));
    settle().await;
    assert_eq!(handler.messages(), vec![("hi".to_string(), 0)]);

    let stats = session.stats();
    assert_eq!(stats.messages_delivered, 1);
    assert!(stats.frames_sent >= 2); // probe ping + text
}

#[tokio::test]
async fn test_outbound_text_is_trimmed() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, _handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    session.request_send("  padded message  ");
    settle().await;

    assert_eq!(
        socket.written(),
        vec![OutboundFrame::Text("padded message".into())]
    );
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    session.request_close();
    session.request_close();
    settle().await;

    assert_eq!(session.state(), ConnectionState::Closing);
    let closes = socket
        .written()
        .into_iter()
        .filter(|f| *f == OutboundFrame::Close)
        .count();
    assert_eq!(closes, 1);
    assert_eq!(handler.status_count("Closing connection..."), 1);

    socket.inject(InboundFrame::Close);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(handler.open_enabled_now());

    // Closing again once closed stays a no-op.
    session.request_close();
    settle().await;
    assert_eq!(handler.status_count("Closing connection..."), 1);

    // A stray frame delivered after teardown never reaches the log.
    socket.inject(InboundFrame::Text("stray".into()));
    settle().await;
    assert!(handler.messages().is_empty());
}

#[tokio::test]
async fn test_remote_close_tears_down() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.inject(InboundFrame::Close);
    settle().await;

    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(handler.open_enabled_now());
    assert!(!handler.send_enabled_now());
}

#[tokio::test]
async fn test_close_while_opening_abandons_attempt() {
    let connector = MockConnector::new();
    connector.stall();
    let (session, handler) = build(&connector, SessionConfig::default());

    session.request_open();
    settle().await;
    assert_eq!(session.state(), ConnectionState::Opening);

    session.request_close();
    settle().await;
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(handler.open_enabled_now());
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_is_transient() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.fail_writes.store(true, Ordering::SeqCst);
    session.request_send("doomed");
    settle().await;

    // The failure is displayed but the connection stays up, send stays
    // enabled, and nothing is retried.
    assert_eq!(handler.last_status(), "Unable to send message");
    assert_eq!(session.state(), ConnectionState::Established);
    assert!(handler.send_enabled_now());

    tokio::time::advance(Duration::from_millis(4001)).await;
    settle().await;
    assert_eq!(handler.last_status(), "Connection is Open.");
}

#[tokio::test(start_paused = true)]
async fn test_revert_shows_state_at_fire_time() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.fail_writes.store(true, Ordering::SeqCst);
    session.request_send("doomed");
    settle().await;
    assert_eq!(handler.last_status(), "Unable to send message");

    // Halfway through the window the connection closes for real.
    tokio::time::advance(Duration::from_millis(2000)).await;
    socket.fail_writes.store(false, Ordering::SeqCst);
    session.request_close();
    settle().await;
    socket.inject(InboundFrame::Close);
    settle().await;

    assert_eq!(session.state(), ConnectionState::Closed);
    // The override still holds the display until the window ends.
    assert_eq!(handler.last_status(), "Unable to send message");

    tokio::time::advance(Duration::from_millis(2001)).await;
    settle().await;
    // The revert reads the state as it is now, not as it was at failure time.
    assert_eq!(handler.last_status(), "Connection is Closed.");
}

#[tokio::test(start_paused = true)]
async fn test_new_failure_resets_the_window() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.fail_writes.store(true, Ordering::SeqCst);
    session.request_send("first");
    settle().await;

    tokio::time::advance(Duration::from_millis(3000)).await;
    session.request_send("second");
    settle().await;

    // The first window would have expired here; the second failure reset it.
    tokio::time::advance(Duration::from_millis(1500)).await;
    settle().await;
    assert_eq!(handler.last_status(), "Unable to send message");

    tokio::time::advance(Duration::from_millis(2501)).await;
    settle().await;
    assert_eq!(handler.last_status(), "Connection is Open.");
}

#[tokio::test]
async fn test_receive_error_keeps_the_loop_alive() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());
    establish(&session, &mut socket).await;

    socket.inject_error();
    socket.inject(InboundFrame::Text("after the error".into()));
    settle().await;

    assert_eq!(handler.status_count("Unable to receive message"), 1);
    assert_eq!(
        handler.messages(),
        vec![("after the error".to_string(), 0)]
    );
    assert_eq!(session.state(), ConnectionState::Established);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_never_promotes() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, handler) = build(&connector, SessionConfig::default());

    session.request_open();
    settle().await;
    assert_eq!(session.state(), ConnectionState::Probing);
    assert_eq!(socket.written().len(), 1); // the ping went out

    // No pong ever arrives.
    tokio::time::advance(Duration::from_millis(5001)).await;
    settle().await;

    assert_eq!(handler.last_status(), "Unable to send ping");
    assert_eq!(session.state(), ConnectionState::Probing);
    assert!(!handler.send_enabled_now());

    // After the window the status reverts to a non-established message.
    tokio::time::advance(Duration::from_millis(4001)).await;
    settle().await;
    assert_eq!(handler.last_status(), "Verifying connection...");
    assert!(!handler.send_enabled_now());

    // The session is left open; closing remains the caller's way out.
    session.request_close();
    settle().await;
    socket.inject(InboundFrame::Close);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_late_pong_after_probe_timeout_is_ignored() {
    let connector = MockConnector::new();
    let mut socket = connector.expect_socket();
    let (session, _handler) = build(&connector, SessionConfig::default());

    session.request_open();
    settle().await;
    let token = match socket.written().as_slice() {
        [OutboundFrame::Ping(token)] => token.clone(),
        other => panic!("expected one ping, got {:?}", other),
    };

    tokio::time::advance(Duration::from_millis(5001)).await;
    settle().await;

    socket.inject(InboundFrame::Pong(token));
    settle().await;
    assert_eq!(session.state(), ConnectionState::Probing);
}
