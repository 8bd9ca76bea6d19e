//! MQTT 报文构造：实时状态文档与 Home Assistant 自动发现配置。

use domain::{EnergyTotals, PerLine, Sample};
use serde::Serialize;

/// 带合计的三相值
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WithTotal {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
    pub total: f64,
}

impl From<PerLine> for WithTotal {
    fn from(values: PerLine) -> Self {
        Self {
            l1: round3(values[0]),
            l2: round3(values[1]),
            l3: round3(values[2]),
            total: round3(values[0] + values[1] + values[2]),
        }
    }
}

/// 不带合计的三相值
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WithoutTotal {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl From<PerLine> for WithoutTotal {
    fn from(values: PerLine) -> Self {
        Self {
            l1: round3(values[0]),
            l2: round3(values[1]),
            l3: round3(values[2]),
        }
    }
}

/// 发布到状态 topic 的文档
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatePayload {
    pub currents: WithTotal,
    pub voltages: WithTotal,
    pub power: WithTotal,
    pub energy: WithTotal,
    pub phase_angles: WithoutTotal,
}

impl StatePayload {
    pub fn new(sample: &Sample, totals: &EnergyTotals) -> Self {
        Self {
            currents: sample.currents.into(),
            voltages: sample.voltages.into(),
            power: sample.power.into(),
            energy: totals.lines.into(),
            phase_angles: sample.phase_angles.into(),
        }
    }
}

/// 保留三位小数（银行家舍入）
fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

/// 一组传感器（同一物理量的 L1/L2/L3[/Total]）
struct SensorGroup {
    key: &'static str,
    json_key: &'static str,
    label: &'static str,
    icon: &'static str,
    unit: &'static str,
    with_total: bool,
}

const SENSOR_GROUPS: &[SensorGroup] = &[
    SensorGroup {
        key: "current",
        json_key: "currents",
        label: "Current",
        icon: "mdi:lightning-bolt-outline",
        unit: "A",
        with_total: true,
    },
    SensorGroup {
        key: "voltage",
        json_key: "voltages",
        label: "Voltage",
        icon: "mdi:sine-wave",
        unit: "V",
        with_total: true,
    },
    SensorGroup {
        key: "power",
        json_key: "power",
        label: "Power",
        icon: "mdi:flash-outline",
        unit: "W",
        with_total: true,
    },
    SensorGroup {
        key: "energy",
        json_key: "energy",
        label: "Energy",
        icon: "mdi:lightning-bolt",
        unit: "kWh",
        with_total: true,
    },
    SensorGroup {
        key: "phase_angle",
        json_key: "phase_angles",
        label: "Phase angle",
        icon: "mdi:angle-acute",
        unit: "deg",
        with_total: false,
    },
];

const LINE_SUFFIXES: &[(&str, &str)] = &[("l1", "L1"), ("l2", "L2"), ("l3", "L3")];
const TOTAL_SUFFIX: (&str, &str) = ("total", "Total");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDevice {
    pub name: String,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryOrigin {
    pub name: String,
    pub sw_version: String,
    pub url: String,
}

/// 单个传感器的自动发现配置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryPayload {
    pub device: DiscoveryDevice,
    pub icon: String,
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub state_class: String,
    pub state_topic: String,
    pub unit_of_measurement: String,
    pub value_template: String,
    pub origin: DiscoveryOrigin,
}

/// 自动发现消息（保留消息）
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: DiscoveryPayload,
}

/// 生成全部传感器的自动发现消息
pub fn discovery_messages(
    discovery_prefix: &str,
    object_id: &str,
    base_topic: &str,
) -> Vec<DiscoveryMessage> {
    let device = DiscoveryDevice {
        name: "Charge Amps Amp Guard".to_string(),
        identifiers: vec![object_id.to_string()],
    };
    let origin = DiscoveryOrigin {
        name: env!("CARGO_PKG_NAME").to_string(),
        sw_version: env!("CARGO_PKG_VERSION").to_string(),
        url: "https://github.com/AnderssonPeter/GuardRelay".to_string(),
    };
    let prefix = discovery_prefix.trim_end_matches('/');

    let mut messages = Vec::new();
    for group in SENSOR_GROUPS {
        let suffixes = LINE_SUFFIXES
            .iter()
            .copied()
            .chain(group.with_total.then_some(TOTAL_SUFFIX));
        for (suffix, suffix_label) in suffixes {
            let sensor_key = format!("{}_{}", group.key, suffix);
            let sensor_id = format!("{}_{}", object_id, sensor_key);
            messages.push(DiscoveryMessage {
                topic: format!("{}/sensor/{}/{}/config", prefix, object_id, sensor_key),
                payload: DiscoveryPayload {
                    device: device.clone(),
                    icon: group.icon.to_string(),
                    name: format!("{} {}", group.label, suffix_label),
                    unique_id: sensor_id.clone(),
                    object_id: sensor_id,
                    state_class: "measurement".to_string(),
                    state_topic: base_topic.to_string(),
                    unit_of_measurement: group.unit.to_string(),
                    value_template: format!("{{{{ value_json.{}.{} }}}}", group.json_key, suffix),
                    origin: origin.clone(),
                },
            });
        }
    }
    messages
}
