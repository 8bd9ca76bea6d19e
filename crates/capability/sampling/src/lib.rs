//! # 采样引擎
//!
//! 按固定周期从设备抓取采样值，用梯形积分累计分相电能，
//! 并把结果交给快照存储与遥测发布两个协作方。
//!
//! ## 周期流程
//!
//! ```text
//! tick(now)
//!   ├─ fetch_sample()            设备协议客户端（必要时隐式重连一次）
//!   ├─ advance(state, now, s)    纯计算：积分 + 锚点推进
//!   ├─ store.append(snapshot)    仅在发生积分时
//!   ├─ publisher.publish(...)    仅在发生积分时
//!   └─ 提交新状态                以上全部成功后
//! ```
//!
//! 引擎本身不重试；`supervise` 负责连续失败计数与退出判定。

mod energy;
mod engine;
mod supervisor;

pub use energy::{
    EnergyState, STALE_INTERVALS, TickOutcome, advance, energy_kwh, stale_window_ms,
};
pub use engine::{EngineError, SamplingEngine};
pub use supervisor::{SupervisorPolicy, supervise};
