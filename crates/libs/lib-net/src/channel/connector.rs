//! Socket seam for the channel manager.
//!
//! A [`Connector`] opens one socket and splits it into an outbound
//! [`FrameSink`] and a stream of [`InboundFrame`]s. Production uses
//! [`TungsteniteConnector`]; tests plug in scripted connections.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, SplitSink};
use futures_util::{SinkExt, StreamExt};
use lib_core::ChannelError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

/// Application-level frame read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// The server sent a close frame.
    Closed { code: Option<u16>, reason: String },
}

/// Outbound half of an open socket.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// An open socket. The stream ends when the socket does.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub frames: BoxStream<'static, Result<InboundFrame, ChannelError>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, ChannelError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.write
            .close()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }
}

/// WebSocket connector over `tokio-tungstenite` (rustls, native roots).
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    url: String,
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn into_frame(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<InboundFrame, ChannelError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text))),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => Some(Ok(InboundFrame::Text(text))),
            Err(_) => {
                debug!("Dropping binary frame that is not UTF-8");
                None
            }
        },
        Ok(Message::Close(frame)) => Some(Ok(match frame {
            Some(frame) => InboundFrame::Closed {
                code: Some(u16::from(frame.code)),
                reason: frame.reason.to_string(),
            },
            None => InboundFrame::Closed {
                code: None,
                reason: String::new(),
            },
        })),
        // Pong replies are queued by tungstenite itself.
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
            trace!("Ignoring control frame");
            None
        }
        Err(e) => Some(Err(ChannelError::Transport(e.to_string()))),
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self) -> Result<Connection, ChannelError> {
        let handshake = connect_async(&self.url);
        let (stream, response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                ChannelError::Connect(format!(
                    "timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!(url = %self.url, status = ?response.status(), "WebSocket handshake complete");

        let (write, read) = stream.split();
        let frames = read
            .filter_map(|message| async move { into_frame(message) })
            .boxed();

        Ok(Connection {
            sink: Box::new(TungsteniteSink { write }),
            frames,
        })
    }
}
