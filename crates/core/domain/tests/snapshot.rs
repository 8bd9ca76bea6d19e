use domain::{EnergyTotals, Snapshot};

#[test]
fn snapshot_exposes_recorded_anchor() {
    let snapshot = Snapshot {
        ts_ms: 1_700_000_000_000,
        power: [1000.0, 500.0, 0.0],
        duration_ms: 30_000,
        energy: EnergyTotals::new([1.5, 2.0, 0.25]),
    };

    let anchor = snapshot.anchor();
    assert_eq!(anchor.ts_ms, 1_700_000_000_000);
    assert_eq!(anchor.power, [1000.0, 500.0, 0.0]);
    assert_eq!(snapshot.energy.total(), 3.75);
}

#[test]
fn energy_totals_default_to_zero() {
    let totals = EnergyTotals::default();
    assert_eq!(totals.lines, [0.0; 3]);
    assert_eq!(totals.total(), 0.0);
}
