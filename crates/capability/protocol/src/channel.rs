//! 帧通道
//!
//! 请求格式为 `"<opcode>,<payload>"`，一条消息即一帧；
//! 响应在固定容量缓冲区内累积直到消息边界，再校验响应操作码。

use crate::error::ProtocolError;
use crate::transport::FrameTransport;
use std::time::Duration;
use tracing::{debug, trace};

/// 接收缓冲区容量（字节）
pub const RECEIVE_BUFFER_CAPACITY: usize = 1024;

/// 基于单一传输的请求/响应帧通道
pub struct FramedChannel<T> {
    transport: T,
    buffer: Box<[u8]>,
    response_timeout: Option<Duration>,
}

impl<T: FrameTransport> FramedChannel<T> {
    pub fn new(transport: T) -> Self {
        Self::with_capacity(transport, RECEIVE_BUFFER_CAPACITY)
    }

    pub fn with_capacity(transport: T, capacity: usize) -> Self {
        Self {
            transport,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            response_timeout: None,
        }
    }

    /// 设置单次响应的等待时限
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        self.transport.close().await
    }

    /// 发送 `"<opcode>,<payload>"`
    pub async fn send(&mut self, opcode: char, payload: &str) -> Result<(), ProtocolError> {
        let message = format!("{},{}", opcode, payload);
        trace!(opcode = %opcode, len = message.len(), "sending frame");
        self.transport.send_text(&message).await
    }

    /// 接收一帧并校验前缀 `"<expected>,"`，返回前缀之后的文本
    pub async fn receive(&mut self, expected: char) -> Result<String, ProtocolError> {
        match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, self.receive_frame(expected))
                .await
                .map_err(|_| {
                    ProtocolError::Timeout(format!(
                        "no response for opcode '{}' within {}ms",
                        expected,
                        limit.as_millis()
                    ))
                })?,
            None => self.receive_frame(expected).await,
        }
    }

    /// 发送请求并接收响应
    pub async fn request(
        &mut self,
        opcode: char,
        payload: &str,
        expected: char,
    ) -> Result<String, ProtocolError> {
        self.send(opcode, payload).await?;
        self.receive(expected).await
    }

    async fn receive_frame(&mut self, expected: char) -> Result<String, ProtocolError> {
        let mut offset = 0;
        loop {
            if offset == self.buffer.len() {
                return Err(ProtocolError::BufferOverflow(self.buffer.len()));
            }
            let chunk = self.transport.receive(&mut self.buffer[offset..]).await?;
            offset += chunk.len;
            if chunk.end_of_message {
                break;
            }
        }

        let content = String::from_utf8_lossy(&self.buffer[..offset]).into_owned();
        debug!(content = %content, "received frame");

        let prefix = format!("{},", expected);
        match content.strip_prefix(prefix.as_str()) {
            Some(body) => Ok(body.to_string()),
            None => Err(ProtocolError::ProtocolViolation {
                expected,
                received: content,
            }),
        }
    }
}
