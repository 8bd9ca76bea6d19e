//! 中继服务共享的领域模型。

pub mod data;

pub use data::{Anchor, EnergyTotals, LINES, PerLine, Sample, Snapshot};

/// 获取当前墙钟时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
