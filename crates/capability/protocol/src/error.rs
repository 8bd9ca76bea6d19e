//! 协议错误类型定义

use crate::state::ConnectionState;

/// 设备协议错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 传输层错误（连接建立失败、连接被对端关闭、读写失败）
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// 响应操作码与预期不符
    #[error("protocol violation: expected opcode '{expected}' but received {received:?}")]
    ProtocolViolation { expected: char, received: String },

    /// 预认证探测响应不符
    #[error("invalid handshake at step {step}: unexpected response {response:?}")]
    InvalidHandshake { step: &'static str, response: String },

    /// 设备拒绝认证
    #[error("authentication rejected by device")]
    AuthenticationFailed,

    /// 抓取响应无法解析为预期的数值结构
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// 未认证（重连后仍未恢复会话）
    #[error("must be authenticated to fetch data")]
    NotAuthenticated,

    /// 接收缓冲区已满但消息尚未结束
    #[error("receive buffer overflow: message exceeds {0} bytes")]
    BufferOverflow(usize),

    /// 等待响应超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 在 I/O 调用点观察到取消信号
    #[error("cancelled")]
    Cancelled,

    /// 状态机收到当前状态不接受的事件
    #[error("illegal transition from {from:?} on {event}")]
    IllegalTransition {
        from: ConnectionState,
        event: &'static str,
    },
}

impl ProtocolError {
    /// 该错误是否使当前连接失效（下次抓取需重连）。
    pub fn invalidates_connection(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure(_)
                | Self::ProtocolViolation { .. }
                | Self::InvalidHandshake { .. }
                | Self::BufferOverflow(_)
                | Self::Timeout(_)
        )
    }
}
