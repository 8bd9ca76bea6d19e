//! 传输层抽象
//!
//! 帧通道只依赖这两个 trait：生产环境使用 WebSocket，测试使用脚本化传输。

use crate::error::ProtocolError;
use async_trait::async_trait;

/// 一次读取的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedChunk {
    /// 本次写入缓冲区的字节数
    pub len: usize,
    /// 传输层是否已到达消息边界
    pub end_of_message: bool,
}

/// 持久双工传输
#[async_trait]
pub trait FrameTransport: Send {
    /// 发送一条完整的文本消息
    async fn send_text(&mut self, message: &str) -> Result<(), ProtocolError>;

    /// 读取入站字节到 `buf`，消息可能分多次到达
    async fn receive(&mut self, buf: &mut [u8]) -> Result<ReceivedChunk, ProtocolError>;

    /// 传输是否仍处于打开状态
    fn is_open(&self) -> bool;

    /// 关闭传输
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// 传输工厂：按 URI 建立新连接
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Transport: FrameTransport + 'static;

    async fn open(&self, uri: &str) -> Result<Self::Transport, ProtocolError>;
}
