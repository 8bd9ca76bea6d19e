//! WebSocket 传输实现
//!
//! 设备以 WebSocket 文本消息为帧。Ping/Pong 控制帧对上层透明；
//! 超出调用方缓冲区的消息按缓冲区大小分段交付，不标记消息结束。

use crate::error::ProtocolError;
use crate::transport::{FrameTransport, ReceivedChunk, TransportConnector};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// 单条消息上限（字节）
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket 连接工厂
#[derive(Debug, Clone)]
pub struct WsConnector {
    max_message_size: usize,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    type Transport = WsTransport;

    async fn open(&self, uri: &str) -> Result<WsTransport, ProtocolError> {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);

        let (stream, response) =
            tokio_tungstenite::connect_async_with_config(uri, Some(config), true)
                .await
                .map_err(|e| ProtocolError::TransportFailure(e.to_string()))?;
        info!(status = %response.status(), "websocket connected to {}", uri);

        Ok(WsTransport {
            stream,
            pending: None,
            open: true,
        })
    }
}

/// 尚未完全交付给上层的入站消息
struct PendingMessage {
    bytes: Vec<u8>,
    consumed: usize,
}

/// WebSocket 传输
pub struct WsTransport {
    stream: WsStream,
    pending: Option<PendingMessage>,
    open: bool,
}

impl WsTransport {
    async fn next_message(&mut self) -> Result<Vec<u8>, ProtocolError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(bytes))) => return Ok(bytes),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    self.open = false;
                    debug!(frame = ?frame, "websocket closed by device");
                    return Err(ProtocolError::TransportFailure(
                        "connection closed by device".to_string(),
                    ));
                }
                Some(Err(e)) => {
                    self.open = false;
                    return Err(ProtocolError::TransportFailure(e.to_string()));
                }
                None => {
                    self.open = false;
                    return Err(ProtocolError::TransportFailure(
                        "connection stream ended".to_string(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send_text(&mut self, message: &str) -> Result<(), ProtocolError> {
        if let Err(e) = self.stream.send(Message::Text(message.to_string())).await {
            self.open = false;
            return Err(ProtocolError::TransportFailure(e.to_string()));
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<ReceivedChunk, ProtocolError> {
        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => PendingMessage {
                bytes: self.next_message().await?,
                consumed: 0,
            },
        };

        let remaining = &pending.bytes[pending.consumed..];
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        pending.consumed += len;

        let end_of_message = pending.consumed == pending.bytes.len();
        if !end_of_message {
            self.pending = Some(pending);
        }
        Ok(ReceivedChunk {
            len,
            end_of_message,
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.pending = None;
        self.stream
            .close(None)
            .await
            .map_err(|e| ProtocolError::TransportFailure(e.to_string()))
    }
}
