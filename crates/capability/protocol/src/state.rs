//! 连接状态机
//!
//! 状态迁移是纯函数：给定当前状态与事件，返回新状态和可选错误。
//! 客户端只负责产生事件并执行 I/O，迁移规则集中在这里。

use crate::error::ProtocolError;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
}

/// 驱动状态迁移的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// 开始建立新连接（旧连接已关闭）
    ConnectRequested,
    /// 传输层握手完成
    TransportOpened,
    /// 连接失效（打开失败、传输错误、协议违例、主动放弃）
    ConnectionLost,
    /// 预认证探测得到预期回显
    ProbeAccepted,
    /// 预认证探测响应不符
    ProbeRejected {
        step: &'static str,
        response: String,
    },
    /// 开始发送认证请求
    AuthenticationStarted,
    /// 设备接受认证
    AuthenticationAccepted,
    /// 设备拒绝认证
    AuthenticationRejected,
}

impl ConnectionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectRequested => "connect_requested",
            Self::TransportOpened => "transport_opened",
            Self::ConnectionLost => "connection_lost",
            Self::ProbeAccepted => "probe_accepted",
            Self::ProbeRejected { .. } => "probe_rejected",
            Self::AuthenticationStarted => "authentication_started",
            Self::AuthenticationAccepted => "authentication_accepted",
            Self::AuthenticationRejected => "authentication_rejected",
        }
    }
}

/// 一次迁移的结果
#[derive(Debug)]
pub struct Transition {
    pub state: ConnectionState,
    pub error: Option<ProtocolError>,
}

impl Transition {
    fn to(state: ConnectionState) -> Self {
        Self { state, error: None }
    }

    fn failed(state: ConnectionState, error: ProtocolError) -> Self {
        Self {
            state,
            error: Some(error),
        }
    }
}

/// 状态迁移函数
pub fn transition(state: ConnectionState, event: ConnectionEvent) -> Transition {
    use ConnectionState::*;

    match (state, event) {
        (_, ConnectionEvent::ConnectRequested) => Transition::to(Connecting),
        (_, ConnectionEvent::ConnectionLost) => Transition::to(Disconnected),
        (Connecting, ConnectionEvent::TransportOpened) => Transition::to(Connected),
        (Connected, ConnectionEvent::ProbeAccepted) => Transition::to(Connected),
        (Connected, ConnectionEvent::ProbeRejected { step, response }) => Transition::failed(
            Disconnected,
            ProtocolError::InvalidHandshake { step, response },
        ),
        (Connected, ConnectionEvent::AuthenticationStarted) => Transition::to(Authenticating),
        (Authenticating, ConnectionEvent::AuthenticationAccepted) => Transition::to(Authenticated),
        // 认证失败时保持 Authenticating，由调用方重新 connect
        (Authenticating, ConnectionEvent::AuthenticationRejected) => {
            Transition::failed(Authenticating, ProtocolError::AuthenticationFailed)
        }
        (from, event) => Transition::failed(
            from,
            ProtocolError::IllegalTransition {
                from,
                event: event.name(),
            },
        ),
    }
}
