use crate::energy::{EnergyState, advance};
use domain::now_epoch_ms;
use relay_protocol::{ProtocolError, SampleSource};
use relay_publish::{PublishError, TelemetryPublisher};
use relay_storage::{SnapshotStore, StorageError};
use relay_telemetry::{
    record_anchor_advance, record_fetch_failure, record_snapshot_write_failure,
    record_snapshot_written, record_stale_gap, record_tick,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 采样周期失败原因，原样携带协作方的错误。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ProtocolError),
    #[error("snapshot persistence failed: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl EngineError {
    /// 取消信号导致的失败（不计入失败次数）。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Fetch(ProtocolError::Cancelled))
    }

    /// 设备拒绝了认证且会话未恢复；只有重新 `connect` 才能解除。
    pub fn is_authentication_stuck(&self) -> bool {
        matches!(
            self,
            EngineError::Fetch(ProtocolError::NotAuthenticated | ProtocolError::AuthenticationFailed)
        )
    }
}

/// 采样引擎：按固定周期抓取、积分、写快照、发布。
pub struct SamplingEngine<S: SampleSource> {
    source: S,
    store: Arc<dyn SnapshotStore>,
    publisher: Arc<dyn TelemetryPublisher>,
    interval: Duration,
    state: EnergyState,
    clock: fn() -> i64,
}

impl<S: SampleSource> SamplingEngine<S> {
    pub fn new(
        source: S,
        store: Arc<dyn SnapshotStore>,
        publisher: Arc<dyn TelemetryPublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            publisher,
            interval,
            state: EnergyState::default(),
            clock: now_epoch_ms,
        }
    }

    /// 替换墙钟（毫秒时间戳来源）。
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> &EnergyState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 从最新快照恢复累计电能与锚点。
    pub async fn recover(&mut self) -> Result<(), EngineError> {
        let last = self.store.last_snapshot().await?;
        self.state = EnergyState::recover(last.as_ref());
        match &last {
            Some(snapshot) => info!(
                target: "relay.sampling",
                ts_ms = snapshot.ts_ms,
                energy_total = snapshot.energy.total(),
                "engine state recovered from snapshot"
            ),
            None => info!(target: "relay.sampling", "no snapshot found, starting from zero"),
        }
        Ok(())
    }

    /// 以当前墙钟时间执行一个周期。
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<(), EngineError> {
        self.tick_at((self.clock)(), cancel).await
    }

    /// 以 `now_ms` 执行一个周期：抓取 → 积分 → 写快照 → 发布。
    ///
    /// 任一步失败时状态保持不变，错误原样返回。
    pub async fn tick_at(
        &mut self,
        now_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        record_tick();
        let sample = match self.source.fetch_sample(cancel).await {
            Ok(sample) => sample,
            Err(err) => {
                record_fetch_failure();
                return Err(err.into());
            }
        };

        let outcome = advance(&self.state, now_ms, &sample, self.interval);
        if outcome.stale_gap {
            record_stale_gap();
            warn!(
                target: "relay.sampling",
                ts_ms = now_ms,
                anchor_ts_ms = self.state.anchor.map(|anchor| anchor.ts_ms),
                "gap exceeds integration window, reseeding anchor"
            );
        }

        if let Some(snapshot) = &outcome.snapshot {
            if let Err(err) = self.store.append(snapshot).await {
                record_snapshot_write_failure();
                return Err(err.into());
            }
            record_snapshot_written();
            debug!(
                target: "relay.sampling",
                ts_ms = snapshot.ts_ms,
                duration_ms = snapshot.duration_ms,
                energy_l1 = snapshot.energy.lines[0],
                energy_l2 = snapshot.energy.lines[1],
                energy_l3 = snapshot.energy.lines[2],
                "snapshot written"
            );
            self.publisher.publish(&sample, &snapshot.energy).await?;
        }

        if outcome.anchor_advanced {
            record_anchor_advance();
            debug!(target: "relay.sampling", ts_ms = now_ms, "anchor advanced");
        }
        self.state = outcome.state;
        Ok(())
    }

    /// 周期循环，直到取消或首个失败。
    ///
    /// 每个周期计时；未用满周期时等待剩余时间，超时则立即开始下一周期。
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), EngineError> {
        info!(
            target: "relay.sampling",
            interval_ms = self.interval.as_millis() as u64,
            "sampling loop started"
        );
        while !cancel.is_cancelled() {
            let started = Instant::now();
            match self.tick(cancel).await {
                Ok(()) => {}
                Err(err) if err.is_cancelled() && cancel.is_cancelled() => break,
                Err(err) => return Err(err),
            }
            let remaining = self.interval.saturating_sub(started.elapsed());
            if !pause(remaining, cancel).await {
                break;
            }
        }
        info!(target: "relay.sampling", "sampling loop stopped");
        Ok(())
    }
}

/// 可取消的等待；被取消时返回 false。
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
