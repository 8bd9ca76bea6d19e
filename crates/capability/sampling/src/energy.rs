//! 电能累计与锚点推进（纯函数，无 I/O）。

use domain::{Anchor, EnergyTotals, LINES, Sample, Snapshot};
use std::time::Duration;

/// 超过 `STALE_INTERVALS` 个采样周期的间隔不参与积分。
pub const STALE_INTERVALS: u32 = 10;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// 引擎跨周期持有的状态：累计电能 + 积分锚点。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyState {
    pub totals: EnergyTotals,
    pub anchor: Option<Anchor>,
}

impl EnergyState {
    /// 从最近一条快照恢复；没有快照时从零开始且无锚点。
    pub fn recover(last: Option<&Snapshot>) -> Self {
        match last {
            Some(snapshot) => Self {
                totals: snapshot.energy,
                anchor: Some(snapshot.anchor()),
            },
            None => Self::default(),
        }
    }
}

/// 单个周期的计算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// 周期成功提交后的新状态
    pub state: EnergyState,
    /// 发生积分时需要写入的快照
    pub snapshot: Option<Snapshot>,
    pub anchor_advanced: bool,
    /// 间隔过长，跳过了积分
    pub stale_gap: bool,
}

/// 梯形积分：两端功率（W）在 `duration_ms` 内的电能（kWh）。
pub fn energy_kwh(start_power: f64, end_power: f64, duration_ms: i64) -> f64 {
    (start_power + end_power) / 2.0 / 1000.0 * (duration_ms as f64 / MS_PER_HOUR)
}

/// 积分窗口上限（毫秒）。
pub fn stale_window_ms(interval: Duration) -> i64 {
    let window = interval.saturating_mul(STALE_INTERVALS).as_millis();
    i64::try_from(window).unwrap_or(i64::MAX)
}

/// 用 `now_ms` 时刻抓到的采样推进状态。
///
/// 不修改 `state`；调用方在持久化与发布都成功后再提交 `TickOutcome::state`。
/// 锚点推进条件只看原锚点：无锚点、间隔过长、任一相功率变化。
pub fn advance(
    state: &EnergyState,
    now_ms: i64,
    sample: &Sample,
    interval: Duration,
) -> TickOutcome {
    let window_ms = stale_window_ms(interval);
    let duration_ms = state.anchor.map_or(0, |anchor| now_ms - anchor.ts_ms);

    let mut next = *state;
    let mut snapshot = None;
    let mut stale_gap = false;

    if let Some(anchor) = state.anchor {
        if duration_ms < window_ms {
            // 时钟回拨时按零时长处理，累计值不回退
            let integrated_ms = duration_ms.max(0);
            for line in 0..LINES {
                next.totals.lines[line] +=
                    energy_kwh(anchor.power[line], sample.power[line], integrated_ms);
            }
            snapshot = Some(Snapshot {
                ts_ms: now_ms,
                power: anchor.power,
                duration_ms: integrated_ms,
                energy: next.totals,
            });
        } else {
            stale_gap = true;
        }
    }

    let anchor_advanced = match state.anchor {
        None => true,
        Some(anchor) => duration_ms >= window_ms || anchor.power != sample.power,
    };
    if anchor_advanced {
        next.anchor = Some(Anchor {
            ts_ms: now_ms,
            power: sample.power,
        });
    }

    TickOutcome {
        state: next,
        snapshot,
        anchor_advanced,
        stale_gap,
    }
}
