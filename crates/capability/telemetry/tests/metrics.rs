use relay_telemetry::{RelayMetrics, metrics, record_reconnect, record_tick};

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_tick();
    record_tick();
    record_reconnect();
    let after = metrics().snapshot();

    assert!(after.ticks >= before.ticks + 2);
    assert!(after.reconnects >= before.reconnects + 1);
}

#[test]
fn fresh_metrics_start_at_zero() {
    assert_eq!(RelayMetrics::new().snapshot(), Default::default());
}
