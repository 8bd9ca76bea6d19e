//! 日志初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub fetch_failures: u64,
    pub reconnects: u64,
    pub snapshots_written: u64,
    pub snapshot_write_failures: u64,
    pub stale_gaps: u64,
    pub anchor_advances: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
}

/// 中继指标。
pub struct RelayMetrics {
    ticks: AtomicU64,
    fetch_failures: AtomicU64,
    reconnects: AtomicU64,
    snapshots_written: AtomicU64,
    snapshot_write_failures: AtomicU64,
    stale_gaps: AtomicU64,
    anchor_advances: AtomicU64,
    publish_success: AtomicU64,
    publish_failure: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            snapshots_written: AtomicU64::new(0),
            snapshot_write_failures: AtomicU64::new(0),
            stale_gaps: AtomicU64::new(0),
            anchor_advances: AtomicU64::new(0),
            publish_success: AtomicU64::new(0),
            publish_failure: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            snapshot_write_failures: self.snapshot_write_failures.load(Ordering::Relaxed),
            stale_gaps: self.stale_gaps.load(Ordering::Relaxed),
            anchor_advances: self.anchor_advances.load(Ordering::Relaxed),
            publish_success: self.publish_success.load(Ordering::Relaxed),
            publish_failure: self.publish_failure.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<RelayMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static RelayMetrics {
    METRICS.get_or_init(RelayMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录采样周期次数。
pub fn record_tick() {
    metrics().ticks.fetch_add(1, Ordering::Relaxed);
}

/// 记录抓取失败次数。
pub fn record_fetch_failure() {
    metrics().fetch_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备隐式重连次数。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录快照写入成功次数。
pub fn record_snapshot_written() {
    metrics().snapshots_written.fetch_add(1, Ordering::Relaxed);
}

/// 记录快照写入失败次数。
pub fn record_snapshot_write_failure() {
    metrics()
        .snapshot_write_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录因间隔过长而跳过积分的次数。
pub fn record_stale_gap() {
    metrics().stale_gaps.fetch_add(1, Ordering::Relaxed);
}

/// 记录锚点推进次数。
pub fn record_anchor_advance() {
    metrics().anchor_advances.fetch_add(1, Ordering::Relaxed);
}

/// 记录遥测发布成功次数。
pub fn record_publish_success() {
    metrics().publish_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录遥测发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failure.fetch_add(1, Ordering::Relaxed);
}
