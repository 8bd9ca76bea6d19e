/// 电表的相线数量（L1/L2/L3）。
pub const LINES: usize = 3;

/// 每条相线一个值。
pub type PerLine = [f64; LINES];

/// 一次成功抓取得到的瞬时采样值。
///
/// 四组数值顺序固定：电流、电压、功率、相位角。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// 电流（A）
    pub currents: PerLine,
    /// 电压（V）
    pub voltages: PerLine,
    /// 有功功率（W）
    pub power: PerLine,
    /// 相位角（deg）
    pub phase_angles: PerLine,
}

/// 分相累计电能（kWh）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTotals {
    pub lines: PerLine,
}

impl EnergyTotals {
    pub fn new(lines: PerLine) -> Self {
        Self { lines }
    }

    /// 三相合计。
    pub fn total(&self) -> f64 {
        self.lines.iter().sum()
    }
}

/// 积分锚点：梯形积分的左端点。
///
/// 只会被整体替换，不会原地修改。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub ts_ms: i64,
    pub power: PerLine,
}

/// 持久化快照（追加写入，按时间戳唯一）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// 快照时间戳（毫秒）
    pub ts_ms: i64,
    /// 积分时锚点的功率（不是本次采样的功率）
    pub power: PerLine,
    /// 距锚点的时长（毫秒）
    pub duration_ms: i64,
    /// 本次积分之后的累计电能
    pub energy: EnergyTotals,
}

impl Snapshot {
    /// 快照所记录的锚点（重启恢复用）。
    pub fn anchor(&self) -> Anchor {
        Anchor {
            ts_ms: self.ts_ms,
            power: self.power,
        }
    }
}
