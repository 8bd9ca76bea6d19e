use domain::{EnergyTotals, Snapshot};
use relay_storage::{InMemorySnapshotStore, SnapshotStore};

fn snapshot(ts_ms: i64, energy: [f64; 3]) -> Snapshot {
    Snapshot {
        ts_ms,
        power: [1000.0, 1000.0, 1000.0],
        duration_ms: 30_000,
        energy: EnergyTotals::new(energy),
    }
}

#[tokio::test]
async fn empty_store_has_no_last_snapshot() {
    let store = InMemorySnapshotStore::new();
    let last = store.last_snapshot().await.expect("last");
    assert!(last.is_none());
}

#[tokio::test]
async fn last_snapshot_is_latest_by_timestamp() {
    let store = InMemorySnapshotStore::new();
    store
        .append(&snapshot(2_000, [0.2, 0.2, 0.2]))
        .await
        .expect("append");
    store
        .append(&snapshot(3_000, [0.3, 0.3, 0.3]))
        .await
        .expect("append");
    store
        .append(&snapshot(1_000, [0.1, 0.1, 0.1]))
        .await
        .expect("append");

    let last = store.last_snapshot().await.expect("last").expect("some");
    assert_eq!(last.ts_ms, 3_000);
    assert_eq!(last.energy.lines, [0.3, 0.3, 0.3]);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn duplicate_timestamp_is_rejected() {
    let store = InMemorySnapshotStore::new();
    store
        .append(&snapshot(1_000, [0.1, 0.1, 0.1]))
        .await
        .expect("append");

    let err = store
        .append(&snapshot(1_000, [9.0, 9.0, 9.0]))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    let kept = store.snapshots();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].energy.lines, [0.1, 0.1, 0.1]);
}

#[tokio::test]
async fn seeded_store_recovers_history() {
    let store = InMemorySnapshotStore::with_snapshots(vec![
        snapshot(1_000, [0.1, 0.1, 0.1]),
        snapshot(5_000, [0.5, 0.4, 0.3]),
    ]);
    let last = store.last_snapshot().await.expect("last").expect("some");
    assert_eq!(last.anchor().ts_ms, 5_000);
    assert_eq!(last.energy.lines, [0.5, 0.4, 0.3]);
}
