//! WebSocket connector built on tokio-tungstenite

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::{Connector, FrameSink, FrameSource, InboundFrame, OutboundFrame, TransportConfig};
use crate::endpoint::Endpoint;
use crate::{Result, SessionError};

/// Write half of a connected WebSocket
type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a connected WebSocket
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Production connector for `ws`/`wss` endpoints
pub struct WsConnector {
    config: TransportConfig,
}

impl WsConnector {
    /// Create a connector with the given transport configuration
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>)> {
        debug!("connecting to {}", endpoint);

        let (socket, response) = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(endpoint.uri()),
        )
        .await
        .map_err(|_| SessionError::Timeout(self.config.connect_timeout.as_millis() as u64))??;

        debug!("websocket handshake complete ({})", response.status());

        let (sink, stream) = socket.split();
        Ok((
            Box::new(WsFrameSink { sink }),
            Box::new(WsFrameSource { stream }),
        ))
    }
}

struct WsFrameSink {
    sink: WsSink,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text),
            OutboundFrame::Ping(token) => Message::Ping(token),
            OutboundFrame::Close => Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })),
        };

        self.sink.send(message).await.map_err(Into::into)
    }
}

struct WsFrameSource {
    stream: WsStream,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next(&mut self) -> Option<Result<InboundFrame>> {
        loop {
            return match self.stream.next().await? {
                Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text))),
                Ok(Message::Binary(data)) => Some(Ok(InboundFrame::Binary(data))),
                Ok(Message::Pong(token)) => Some(Ok(InboundFrame::Pong(token))),
                // The pong reply is queued by tungstenite itself.
                Ok(Message::Ping(_)) => continue,
                Ok(Message::Close(_)) => Some(Ok(InboundFrame::Close)),
                Ok(Message::Frame(_)) => continue,
                Err(e) => Some(Err(e.into())),
            };
        }
    }
}
