use crate::payload::{discovery_messages, StatePayload};
use crate::{PublishError, TelemetryPublisher};
use async_trait::async_trait;
use domain::{EnergyTotals, Sample};
use relay_telemetry::{record_publish_failure, record_publish_success};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 自动发现前等待 broker 连接的时限
const DISCOVERY_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 请求队列容量
const REQUEST_CAPACITY: usize = 32;

/// MQTT 发布器配置。
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 未设置时生成 `guard-relay-<uuid>`
    pub client_id: Option<String>,
    pub base_topic: String,
    pub discovery_prefix: String,
    pub object_id: String,
    pub qos: u8,
    pub use_tls: bool,
    /// PEM 文件，同时包含客户端证书链与私钥
    pub client_certificate: Option<PathBuf>,
    /// PEM CA 证书；未设置时使用系统根证书
    pub ca_certificate: Option<PathBuf>,
}

/// MQTT 发布器实现。
///
/// 发布走 `try_publish`，不在请求队列上等待；broker 未连接时直接返回错误。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    base_topic: String,
    discovery_prefix: String,
    object_id: String,
    qos: QoS,
}

impl MqttPublisher {
    /// 校验配置、创建客户端并在后台驱动 eventloop。
    ///
    /// 返回的 `JoinHandle` 由调用方在退出时 abort。
    pub fn connect(
        config: MqttPublisherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), PublishError> {
        if config.host.trim().is_empty() {
            return Err(PublishError::Config("mqtt host is empty".to_string()));
        }
        if config.base_topic.trim().is_empty() {
            return Err(PublishError::Config("mqtt base topic is empty".to_string()));
        }
        let transport = transport_for(&config)?;

        let client_id = config
            .client_id
            .unwrap_or_else(|| format!("guard-relay-{}", uuid::Uuid::new_v4()));
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        if let Some(transport) = transport {
            options.set_transport(transport);
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        state_tx.send_replace(true);
                        info!(target: "relay.publish", "mqtt broker connected");
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        state_tx.send_replace(false);
                        warn!(target: "relay.publish", "mqtt broker sent disconnect");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        state_tx.send_replace(false);
                        warn!(target: "relay.publish", "mqtt eventloop error: {}", err);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
        Ok((
            Self {
                client,
                connected: state_rx,
                base_topic: config.base_topic,
                discovery_prefix: config.discovery_prefix,
                object_id: config.object_id,
                qos: qos_from_u8(config.qos),
            },
            handle,
        ))
    }

    /// 当前是否已与 broker 建立会话。
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// 等待 broker 连接，超时返回错误。
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), PublishError> {
        let mut state = self.connected.clone();
        match tokio::time::timeout(timeout, state.wait_for(|connected| *connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(PublishError::Transport(
                "mqtt event loop stopped".to_string(),
            )),
            Err(_) => Err(PublishError::Transport(format!(
                "mqtt broker not connected within {} ms",
                timeout.as_millis()
            ))),
        }
    }

    /// 发布 Home Assistant 自动发现配置（保留消息）。
    pub async fn configure_device(&self) -> Result<(), PublishError> {
        self.wait_connected(DISCOVERY_CONNECT_TIMEOUT).await?;
        let messages = discovery_messages(&self.discovery_prefix, &self.object_id, &self.base_topic);
        let count = messages.len();
        for message in messages {
            let payload = serde_json::to_vec(&message.payload)
                .map_err(|err| PublishError::Payload(err.to_string()))?;
            debug!(target: "relay.publish", topic = %message.topic, "discovery_publish");
            self.client
                .try_publish(message.topic, self.qos, true, payload)
                .map_err(|err| PublishError::Transport(err.to_string()))?;
        }
        info!(
            target: "relay.publish",
            object_id = %self.object_id,
            sensors = count,
            "device discovery published"
        );
        Ok(())
    }

    fn publish_state(&self, payload: &StatePayload) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Transport(
                "mqtt broker not connected".to_string(),
            ));
        }
        let body =
            serde_json::to_vec(payload).map_err(|err| PublishError::Payload(err.to_string()))?;
        debug!(
            target: "relay.publish",
            topic = %self.base_topic,
            payload_size = body.len(),
            "state_publish"
        );
        self.client
            .try_publish(self.base_topic.clone(), self.qos, false, body)
            .map_err(|err| PublishError::Transport(err.to_string()))
    }
}

#[async_trait]
impl TelemetryPublisher for MqttPublisher {
    async fn publish(&self, sample: &Sample, totals: &EnergyTotals) -> Result<(), PublishError> {
        let payload = StatePayload::new(sample, totals);
        match self.publish_state(&payload) {
            Ok(()) => {
                record_publish_success();
                Ok(())
            }
            Err(err) => {
                record_publish_failure();
                Err(err)
            }
        }
    }
}

/// TLS 传输：客户端证书需配合 CA 文件，否则使用系统根证书。
fn transport_for(config: &MqttPublisherConfig) -> Result<Option<Transport>, PublishError> {
    match (&config.client_certificate, &config.ca_certificate) {
        (Some(certificate), Some(ca)) => {
            let identity = read_pem(certificate)?;
            Ok(Some(Transport::tls_with_config(TlsConfiguration::Simple {
                ca: read_pem(ca)?,
                alpn: None,
                client_auth: Some((identity.clone(), identity)),
            })))
        }
        (Some(_), None) => Err(PublishError::Config(
            "client certificate requires a CA certificate".to_string(),
        )),
        (None, Some(ca)) => Ok(Some(Transport::tls_with_config(TlsConfiguration::Simple {
            ca: read_pem(ca)?,
            alpn: None,
            client_auth: None,
        }))),
        (None, None) if config.use_tls => Ok(Some(Transport::tls_with_default_config())),
        (None, None) => Ok(None),
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, PublishError> {
    std::fs::read(path)
        .map_err(|err| PublishError::Config(format!("cannot read {}: {}", path.display(), err)))
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}
