use crate::engine::{EngineError, SamplingEngine, pause};
use relay_protocol::SampleSource;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 失败重试策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// 允许的连续失败次数，超过后返回最后一个错误
    pub max_consecutive_failures: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
        }
    }
}

/// 带重试地驱动引擎，直到取消或连续失败超限。
///
/// 失败的周期之后等待一个完整周期再重试；引擎状态在重试间保留。
pub async fn supervise<S: SampleSource>(
    engine: &mut SamplingEngine<S>,
    policy: SupervisorPolicy,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let interval = engine.interval();
    let mut consecutive_failures: u32 = 0;

    while !cancel.is_cancelled() {
        let started = Instant::now();
        let wait = match engine.tick(cancel).await {
            Ok(()) => {
                if consecutive_failures > 0 {
                    info!(
                        target: "relay.sampling",
                        after_failures = consecutive_failures,
                        "sampling recovered"
                    );
                }
                consecutive_failures = 0;
                interval.saturating_sub(started.elapsed())
            }
            Err(err) if err.is_cancelled() && cancel.is_cancelled() => break,
            Err(err) => {
                consecutive_failures += 1;
                if consecutive_failures > policy.max_consecutive_failures {
                    error!(
                        target: "relay.sampling",
                        failures = consecutive_failures,
                        error = %err,
                        "giving up after consecutive tick failures"
                    );
                    return Err(err);
                }
                if err.is_authentication_stuck() {
                    // 会话停在认证阶段，后续周期不会自动重连
                    warn!(
                        target: "relay.sampling",
                        failures = consecutive_failures,
                        max = policy.max_consecutive_failures,
                        error = %err,
                        "device rejected authentication, session will not recover without restart"
                    );
                } else {
                    warn!(
                        target: "relay.sampling",
                        failures = consecutive_failures,
                        max = policy.max_consecutive_failures,
                        error = %err,
                        "tick failed, retrying next interval"
                    );
                }
                interval
            }
        };
        if !pause(wait, cancel).await {
            break;
        }
    }
    info!(target: "relay.sampling", "supervisor stopped");
    Ok(())
}
