//! 电表中继服务：设备 → 采样引擎 → PostgreSQL 快照 + MQTT 遥测。

use relay_config::{AppConfig, MqttConfig};
use relay_protocol::{DeviceClient, DeviceClientConfig, WsConnector};
use relay_publish::{MqttPublisher, MqttPublisherConfig, NoopPublisher, TelemetryPublisher};
use relay_sampling::{SamplingEngine, SupervisorPolicy, supervise};
use relay_storage::PgSnapshotStore;
use relay_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // Ctrl-C 触发协作式取消
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        signal_token.cancel();
    });

    if !delay_start(config.start_delay, &cancel).await {
        info!("shutdown requested during start delay");
        return Ok(());
    }

    // 快照存储（首次启动自动建表）
    let store = Arc::new(PgSnapshotStore::connect(&config.database_url).await?);
    store.ensure_schema().await?;

    // 遥测发布：关闭时使用空实现
    let mut mqtt_task = None;
    let publisher: Arc<dyn TelemetryPublisher> = if config.publish_enabled {
        let (publisher, handle) = MqttPublisher::connect(publisher_config(&config.mqtt))?;
        publisher.configure_device().await?;
        mqtt_task = Some(handle);
        Arc::new(publisher)
    } else {
        warn!("telemetry publishing disabled");
        Arc::new(NoopPublisher)
    };

    // 设备连接与握手（失败直接退出）
    let mut client_config = DeviceClientConfig::new(&config.device_uri, &config.device_pin);
    client_config.response_timeout = config.response_timeout;
    let mut client = DeviceClient::new(client_config, WsConnector::default());
    client.connect(&cancel).await?;

    let mut engine = SamplingEngine::new(client, store, publisher, config.fetch_interval);
    engine.recover().await?;

    let policy = SupervisorPolicy {
        max_consecutive_failures: config.max_consecutive_failures,
    };
    let result = supervise(&mut engine, policy, &cancel).await;

    if let Some(handle) = mqtt_task {
        handle.abort();
    }
    let snapshot = metrics().snapshot();
    info!(
        ticks = snapshot.ticks,
        fetch_failures = snapshot.fetch_failures,
        reconnects = snapshot.reconnects,
        snapshots_written = snapshot.snapshots_written,
        snapshot_write_failures = snapshot.snapshot_write_failures,
        stale_gaps = snapshot.stale_gaps,
        anchor_advances = snapshot.anchor_advances,
        publish_success = snapshot.publish_success,
        publish_failure = snapshot.publish_failure,
        "relay stopped"
    );
    result?;
    Ok(())
}

fn publisher_config(mqtt: &MqttConfig) -> MqttPublisherConfig {
    MqttPublisherConfig {
        host: mqtt.host.clone(),
        port: mqtt.port,
        username: mqtt.username.clone(),
        password: mqtt.password.clone(),
        client_id: mqtt.client_id.clone(),
        base_topic: mqtt.base_topic.clone(),
        discovery_prefix: mqtt.discovery_prefix.clone(),
        object_id: mqtt.object_id.clone(),
        qos: mqtt.qos,
        use_tls: mqtt.use_tls,
        client_certificate: mqtt.client_certificate.clone(),
        ca_certificate: mqtt.ca_certificate.clone(),
    }
}

/// 启动前的可选等待；期间收到取消时返回 false。
async fn delay_start(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    info!(delay_ms = delay.as_millis() as u64, "delaying start");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
