//! 应用运行配置加载。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub device_uri: String,
    pub device_pin: String,
    pub fetch_interval: Duration,
    pub response_timeout: Option<Duration>,
    pub database_url: String,
    pub max_consecutive_failures: u32,
    pub start_delay: Duration,
    pub publish_enabled: bool,
    pub mqtt: MqttConfig,
}

/// MQTT 发布配置。
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub base_topic: String,
    pub discovery_prefix: String,
    pub object_id: String,
    pub qos: u8,
    /// 启用 TLS（设置了证书文件时自动启用）
    pub use_tls: bool,
    /// 客户端证书 PEM（证书链 + 私钥）
    pub client_certificate: Option<PathBuf>,
    /// CA 证书 PEM
    pub ca_certificate: Option<PathBuf>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置（便于测试）。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };

        let device_uri = source.required("GUARD_DEVICE_URI")?;
        let device_pin = source.required("GUARD_DEVICE_PIN")?;
        if !device_pin.chars().all(|c| c.is_ascii_digit()) {
            // PIN 不回显到错误信息中
            return Err(ConfigError::Invalid(
                "GUARD_DEVICE_PIN".to_string(),
                "<non-numeric>".to_string(),
            ));
        }
        let database_url = source.required("GUARD_DATABASE_URL")?;

        let fetch_interval_seconds = source.u64_with_default("GUARD_FETCH_INTERVAL_SECONDS", 30)?;
        if fetch_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "GUARD_FETCH_INTERVAL_SECONDS".to_string(),
                "0".to_string(),
            ));
        }
        let response_timeout_ms = source.u64_with_default("GUARD_RESPONSE_TIMEOUT_MS", 10_000)?;
        let max_consecutive_failures =
            source.u32_with_default("GUARD_MAX_CONSECUTIVE_FAILURES", 5)?;
        let start_delay_seconds = source.u64_with_default("GUARD_START_DELAY_SECONDS", 0)?;
        let publish_enabled = source.bool_with_default("GUARD_PUBLISH_ENABLED", true);

        let username = source.optional("GUARD_MQTT_USERNAME");
        let password = source.optional("GUARD_MQTT_PASSWORD");
        if username.is_some() != password.is_some() {
            return Err(ConfigError::Invalid(
                "GUARD_MQTT_USERNAME".to_string(),
                "username and password must be set together".to_string(),
            ));
        }
        let qos = source.u8_with_default("GUARD_MQTT_QOS", 0)?;
        if qos > 2 {
            return Err(ConfigError::Invalid(
                "GUARD_MQTT_QOS".to_string(),
                qos.to_string(),
            ));
        }
        let client_certificate = source
            .optional("GUARD_MQTT_CLIENT_CERTIFICATE")
            .map(PathBuf::from);
        let ca_certificate = source
            .optional("GUARD_MQTT_CA_CERTIFICATE")
            .map(PathBuf::from);
        if client_certificate.is_some() && ca_certificate.is_none() {
            return Err(ConfigError::Invalid(
                "GUARD_MQTT_CA_CERTIFICATE".to_string(),
                "required with GUARD_MQTT_CLIENT_CERTIFICATE".to_string(),
            ));
        }
        let use_tls = source.bool_with_default("GUARD_MQTT_USE_TLS", false)
            || client_certificate.is_some()
            || ca_certificate.is_some();
        let mqtt = MqttConfig {
            host: source
                .optional("GUARD_MQTT_HOST")
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: source.u16_with_default("GUARD_MQTT_PORT", 1883)?,
            username,
            password,
            client_id: source.optional("GUARD_MQTT_CLIENT_ID"),
            base_topic: source
                .optional("GUARD_MQTT_BASE_TOPIC")
                .unwrap_or_else(|| "GuardRelay".to_string()),
            discovery_prefix: source
                .optional("GUARD_MQTT_DISCOVERY_PREFIX")
                .unwrap_or_else(|| "homeassistant".to_string()),
            object_id: source
                .optional("GUARD_MQTT_OBJECT_ID")
                .unwrap_or_else(|| "ChargeAmpsGuard".to_string()),
            qos,
            use_tls,
            client_certificate,
            ca_certificate,
        };

        Ok(Self {
            device_uri,
            device_pin,
            fetch_interval: Duration::from_secs(fetch_interval_seconds),
            response_timeout: (response_timeout_ms > 0)
                .then(|| Duration::from_millis(response_timeout_ms)),
            database_url,
            max_consecutive_failures,
            start_delay: Duration::from_secs(start_delay_seconds),
            publish_enabled,
            mqtt,
        })
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        match (self.lookup)(key) {
            Some(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    fn u64_with_default(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.parse_with_default(key, default)
    }

    fn u32_with_default(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        self.parse_with_default(key, default)
    }

    fn u16_with_default(&self, key: &str, default: u16) -> Result<u16, ConfigError> {
        self.parse_with_default(key, default)
    }

    fn u8_with_default(&self, key: &str, default: u8) -> Result<u8, ConfigError> {
        self.parse_with_default(key, default)
    }

    fn parse_with_default<T: std::str::FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        let value = match self.optional(key) {
            Some(value) => value,
            None => return Ok(default),
        };
        value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value))
    }

    fn bool_with_default(&self, key: &str, default: bool) -> bool {
        match self.optional(key) {
            Some(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
            None => default,
        }
    }
}
