//! 设备协议客户端
//!
//! 持有帧通道与连接状态机。`connect` 总是先拆除现有连接再完整握手；
//! `fetch_sample` 在传输未打开时自动重连一次，这是唯一的隐式重连路径。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let config = DeviceClientConfig::new("ws://192.168.1.50/ws", "1234");
//! let mut client = DeviceClient::new(config, WsConnector::new());
//! client.connect(&cancel).await?;
//! let sample = client.fetch_sample(&cancel).await?;
//! ```

use crate::channel::FramedChannel;
use crate::error::ProtocolError;
use crate::handshake::{
    HandshakeStep, StepPhase, DEFAULT_HANDSHAKE, FETCH_OPCODE, FETCH_PAYLOAD,
    FETCH_RESPONSE_OPCODE,
};
use crate::state::{transition, ConnectionEvent, ConnectionState};
use crate::transport::TransportConnector;
use async_trait::async_trait;
use domain::{Sample, LINES};
use relay_telemetry::record_reconnect;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 抓取响应中的数值个数：电流、电压、功率、相位角各三相
const SAMPLE_VALUE_COUNT: usize = 4 * LINES;

/// 设备客户端配置
#[derive(Debug, Clone)]
pub struct DeviceClientConfig {
    /// 设备连接 URI
    pub uri: String,
    /// 认证 PIN
    pub pin: String,
    /// 单次响应等待时限（None 表示不限）
    pub response_timeout: Option<Duration>,
}

impl DeviceClientConfig {
    pub fn new(uri: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            pin: pin.into(),
            response_timeout: None,
        }
    }
}

/// 采样源抽象（采样引擎只依赖该接口）
#[async_trait]
pub trait SampleSource: Send {
    async fn fetch_sample(&mut self, cancel: &CancellationToken) -> Result<Sample, ProtocolError>;
}

/// 设备协议客户端
pub struct DeviceClient<C: TransportConnector> {
    config: DeviceClientConfig,
    connector: C,
    handshake: &'static [HandshakeStep],
    channel: Option<FramedChannel<C::Transport>>,
    state: ConnectionState,
}

impl<C: TransportConnector> DeviceClient<C> {
    pub fn new(config: DeviceClientConfig, connector: C) -> Self {
        Self::with_handshake(config, connector, DEFAULT_HANDSHAKE)
    }

    /// 使用自定义握手步骤
    pub fn with_handshake(
        config: DeviceClientConfig,
        connector: C,
        handshake: &'static [HandshakeStep],
    ) -> Self {
        Self {
            config,
            connector,
            handshake,
            channel: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_transport_open(&self) -> bool {
        self.channel.as_ref().is_some_and(|channel| channel.is_open())
    }

    /// 建立连接并完成握手（幂等，总是先关闭现有传输）
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<(), ProtocolError> {
        if let Some(mut channel) = self.channel.take() {
            if channel.is_open() {
                if let Err(e) = channel.close().await {
                    warn!("failed to close previous device connection: {}", e);
                }
            }
        }
        self.apply(ConnectionEvent::ConnectionLost)?;

        if cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled);
        }

        info!("connecting to device at {}", self.config.uri);
        self.apply(ConnectionEvent::ConnectRequested)?;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
            opened = self.connector.open(&self.config.uri) => opened,
        };
        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                self.apply(ConnectionEvent::ConnectionLost)?;
                return Err(e);
            }
        };
        self.channel = Some(
            FramedChannel::new(transport).with_response_timeout(self.config.response_timeout),
        );
        self.apply(ConnectionEvent::TransportOpened)?;

        for step in self.handshake {
            self.run_step(step, cancel).await?;
        }
        info!("device connection authenticated");
        Ok(())
    }

    /// 抓取一次采样值
    pub async fn fetch_sample(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Sample, ProtocolError> {
        debug!("fetching sample");
        if !self.is_transport_open() {
            warn!(
                "device connection expected open but was {:?}, reconnecting",
                self.state
            );
            record_reconnect();
            self.connect(cancel).await?;
        }
        if self.state != ConnectionState::Authenticated {
            return Err(ProtocolError::NotAuthenticated);
        }

        let response = self
            .exchange(FETCH_OPCODE, FETCH_PAYLOAD, FETCH_RESPONSE_OPCODE, cancel)
            .await?;
        parse_sample(&response)
    }

    async fn run_step(
        &mut self,
        step: &HandshakeStep,
        cancel: &CancellationToken,
    ) -> Result<(), ProtocolError> {
        debug!(
            step = step.name,
            payload = step.loggable_payload(),
            "handshake step"
        );
        if step.phase == StepPhase::Authenticate {
            self.apply(ConnectionEvent::AuthenticationStarted)?;
        }

        let payload = step.payload(&self.config.pin).to_string();
        let response = self
            .exchange(step.request_opcode, &payload, step.response_opcode, cancel)
            .await?;
        let accepted = response == step.expected;

        let event = match (step.phase, accepted) {
            (StepPhase::Probe, true) => ConnectionEvent::ProbeAccepted,
            (StepPhase::Probe, false) => ConnectionEvent::ProbeRejected {
                step: step.name,
                response,
            },
            (StepPhase::Authenticate, true) => ConnectionEvent::AuthenticationAccepted,
            (StepPhase::Authenticate, false) => ConnectionEvent::AuthenticationRejected,
        };
        let result = self.apply(event);
        if self.state == ConnectionState::Disconnected {
            self.close_channel().await;
        }
        result
    }

    /// 一次请求/响应；使连接失效的错误会关闭传输并回到 Disconnected
    async fn exchange(
        &mut self,
        opcode: char,
        payload: &str,
        expected: char,
        cancel: &CancellationToken,
    ) -> Result<String, ProtocolError> {
        if cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled);
        }
        let channel = self.channel.as_mut().ok_or_else(|| {
            ProtocolError::TransportFailure("device transport is not open".to_string())
        })?;

        let result = channel.request(opcode, payload, expected).await;
        if let Err(e) = &result {
            if e.invalidates_connection() {
                warn!("device connection invalidated: {}", e);
                self.close_channel().await;
                self.state = transition(self.state, ConnectionEvent::ConnectionLost).state;
            }
        }
        result
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!("closing device transport failed: {}", e);
            }
        }
    }

    fn apply(&mut self, event: ConnectionEvent) -> Result<(), ProtocolError> {
        let next = transition(self.state, event);
        if next.state != self.state {
            debug!(from = ?self.state, to = ?next.state, "connection state changed");
        }
        self.state = next.state;
        match next.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<C: TransportConnector> SampleSource for DeviceClient<C> {
    async fn fetch_sample(&mut self, cancel: &CancellationToken) -> Result<Sample, ProtocolError> {
        DeviceClient::fetch_sample(self, cancel).await
    }
}

/// 解析抓取响应：12 个逗号分隔的数值，依次为电流、电压、功率、相位角
pub fn parse_sample(body: &str) -> Result<Sample, ProtocolError> {
    let values = body
        .split(',')
        .map(|token| {
            token.trim().parse::<f64>().map_err(|_| {
                ProtocolError::MalformedPayload(format!("non-numeric token {:?}", token))
            })
        })
        .collect::<Result<Vec<f64>, ProtocolError>>()?;

    if values.len() != SAMPLE_VALUE_COUNT {
        return Err(ProtocolError::MalformedPayload(format!(
            "expected {} values but got {}",
            SAMPLE_VALUE_COUNT,
            values.len()
        )));
    }

    let group = |index: usize| -> [f64; LINES] {
        let start = index * LINES;
        [values[start], values[start + 1], values[start + 2]]
    };
    Ok(Sample {
        currents: group(0),
        voltages: group(1),
        power: group(2),
        phase_angles: group(3),
    })
}
