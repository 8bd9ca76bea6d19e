//! 遥测发布能力
//!
//! 每次采样成功后，把实时值与累计电能发布到 MQTT 状态 topic；
//! 启动时向 Home Assistant 发布一次自动发现配置。
//!
//! - `TelemetryPublisher`：发布接口，采样引擎只依赖这个 trait
//! - `MqttPublisher`：基于 rumqttc 的实现
//! - `NoopPublisher`：关闭发布时的占位实现

mod mqtt;
mod payload;

use async_trait::async_trait;
use domain::{EnergyTotals, Sample};

pub use mqtt::{MqttPublisher, MqttPublisherConfig};
pub use payload::{
    discovery_messages, DiscoveryDevice, DiscoveryMessage, DiscoveryOrigin, DiscoveryPayload,
    StatePayload, WithTotal, WithoutTotal,
};

/// 发布链路错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("config error: {0}")]
    Config(String),
    #[error("payload error: {0}")]
    Payload(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// 遥测发布器抽象。
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    async fn publish(&self, sample: &Sample, totals: &EnergyTotals) -> Result<(), PublishError>;
}

/// 空发布器（发布关闭时使用）。
#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl TelemetryPublisher for NoopPublisher {
    async fn publish(&self, _sample: &Sample, _totals: &EnergyTotals) -> Result<(), PublishError> {
        Ok(())
    }
}
