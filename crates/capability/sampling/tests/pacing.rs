use async_trait::async_trait;
use domain::{EnergyTotals, Sample};
use relay_protocol::{ProtocolError, SampleSource};
use relay_publish::{PublishError, TelemetryPublisher};
use relay_sampling::{SamplingEngine, SupervisorPolicy, supervise};
use relay_storage::InMemorySnapshotStore;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(30);

thread_local! {
    static ORIGIN: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// 以测试开始时刻为零点、跟随 tokio 暂停时钟的墙钟
fn paused_clock() -> i64 {
    ORIGIN.with(|origin| {
        origin
            .get()
            .map_or(0, |start| start.elapsed().as_millis() as i64)
    })
}

fn start_clock() -> Instant {
    let now = Instant::now();
    ORIGIN.with(|origin| origin.set(Some(now)));
    now
}

/// 每次抓取耗时可控；脚本耗尽时触发取消
struct TimedSource {
    script: VecDeque<(Duration, bool)>,
    starts: Arc<Mutex<Vec<Instant>>>,
    cancel: CancellationToken,
}

#[async_trait]
impl SampleSource for TimedSource {
    async fn fetch_sample(&mut self, _cancel: &CancellationToken) -> Result<Sample, ProtocolError> {
        self.starts.lock().unwrap().push(Instant::now());
        let Some((cost, ok)) = self.script.pop_front() else {
            self.cancel.cancel();
            return Err(ProtocolError::Cancelled);
        };
        tokio::time::sleep(cost).await;
        if !ok {
            return Err(ProtocolError::TransportFailure("device hung up".to_string()));
        }
        Ok(Sample {
            currents: [2.0; 3],
            voltages: [230.0; 3],
            power: [460.0; 3],
            phase_angles: [0.0; 3],
        })
    }
}

struct NullPublisher;

#[async_trait]
impl TelemetryPublisher for NullPublisher {
    async fn publish(&self, _sample: &Sample, _totals: &EnergyTotals) -> Result<(), PublishError> {
        Ok(())
    }
}

fn engine(
    script: Vec<(Duration, bool)>,
    cancel: &CancellationToken,
) -> (SamplingEngine<TimedSource>, Arc<Mutex<Vec<Instant>>>) {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let source = TimedSource {
        script: script.into(),
        starts: starts.clone(),
        cancel: cancel.clone(),
    };
    let engine = SamplingEngine::new(
        source,
        Arc::new(InMemorySnapshotStore::new()),
        Arc::new(NullPublisher),
        INTERVAL,
    )
    .with_clock(paused_clock);
    (engine, starts)
}

fn offsets(origin: Instant, starts: &Mutex<Vec<Instant>>) -> Vec<Duration> {
    starts
        .lock()
        .unwrap()
        .iter()
        .map(|start| start.duration_since(origin))
        .collect()
}

fn assert_offsets(actual: &[Duration], expected_secs: &[u64]) {
    assert_eq!(actual.len(), expected_secs.len(), "tick count: {actual:?}");
    for (actual, expected) in actual.iter().zip(expected_secs) {
        let expected = Duration::from_secs(*expected);
        let drift = actual.abs_diff(expected);
        assert!(
            drift <= Duration::from_millis(50),
            "tick at {actual:?}, expected {expected:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn run_waits_remainder_and_skips_wait_after_overrun() {
    let cancel = CancellationToken::new();
    let (mut engine, starts) = engine(
        vec![
            (Duration::from_secs(1), true),
            (Duration::from_secs(45), true),
            (Duration::from_secs(1), true),
            (Duration::from_secs(1), true),
        ],
        &cancel,
    );
    let origin = start_clock();

    engine.run(&cancel).await.unwrap();

    // 快速周期只等剩余时间；超时周期之后立即开始，不补发
    assert_offsets(&offsets(origin, &starts), &[0, 30, 75, 105, 135]);
}

#[tokio::test(start_paused = true)]
async fn supervisor_waits_full_interval_after_failure() {
    let cancel = CancellationToken::new();
    let (mut engine, starts) = engine(
        vec![
            (Duration::from_secs(1), true),
            (Duration::from_secs(1), false),
            (Duration::from_secs(1), true),
        ],
        &cancel,
    );
    let origin = start_clock();

    supervise(&mut engine, SupervisorPolicy::default(), &cancel)
        .await
        .unwrap();

    assert_offsets(&offsets(origin, &starts), &[0, 30, 61, 91]);
}
