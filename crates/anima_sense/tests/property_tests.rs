//! Property-based tests for the sensing pipeline and drift.
//!
//! The two invariants the rest of the system leans on hardest:
//! anima stays in [0,1] for ANY readings/calibration, and the drift
//! budget never exceeds its bound no matter what the attractor does.

use proptest::prelude::*;

use anima_core::{Calibration, Dimension, NeuralBands, SensorReadings};
use anima_sense::{drift::offset_bounds, sense_self, DriftField, TOTAL_OFFSET_BUDGET};

fn arb_option_f32(range: std::ops::Range<f32>) -> impl Strategy<Value = Option<f32>> {
    proptest::option::of(range)
}

fn arb_readings() -> impl Strategy<Value = SensorReadings> {
    (
        arb_option_f32(-20.0..120.0),
        arb_option_f32(-40.0..60.0),
        arb_option_f32(0.0..100.0),
        arb_option_f32(800.0..1200.0),
        arb_option_f32(0.0..50000.0),
        arb_option_f32(0.0..100.0),
        arb_option_f32(0.0..100.0),
        arb_option_f32(0.0..100.0),
        proptest::option::of((0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0)),
    )
        .prop_map(
            |(cpu_temp, ambient, humidity, pressure, world, cpu, mem, io, bands)| SensorReadings {
                cpu_temp_c: cpu_temp,
                ambient_temp_c: ambient,
                humidity_pct: humidity,
                pressure_hpa: pressure,
                world_light_lux: world,
                cpu_pct: cpu,
                mem_pct: mem,
                io_wait_pct: io,
                bands: bands.map(|(d, t, a, b, g)| NeuralBands {
                    delta: d,
                    theta: t,
                    alpha: a,
                    beta: b,
                    gamma: g,
                }),
                ..Default::default()
            },
        )
}

fn arb_midpoints() -> impl Strategy<Value = [f32; 4]> {
    (0.35f32..=0.7, 0.4f32..=0.65, 0.35f32..=0.65, 0.4f32..=0.6)
        .prop_map(|(w, c, s, p)| [w, c, s, p])
}

proptest! {
    /// For all readings and midpoints, anima ∈ [0,1]^4.
    #[test]
    fn sensed_anima_always_in_range(
        readings in arb_readings(),
        midpoints in arb_midpoints(),
        trend in 0.0f32..=1.0,
    ) {
        let cal = Calibration::default();
        let sensed = sense_self(&readings, &cal, Some(&midpoints), trend);
        for dim in Dimension::ALL {
            let v = sensed.anima.get(dim);
            prop_assert!(v.is_finite() && (0.0..=1.0).contains(&v));
            let r = sensed.raw.get(dim);
            prop_assert!(r.is_finite() && (0.0..=1.0).contains(&r));
        }
        prop_assert!((0.0..=1.0).contains(&sensed.confidence));
    }

    /// Drift offsets stay within per-dimension bounds and the total
    /// budget after any sequence of updates.
    #[test]
    fn drift_budget_always_holds(
        centers in proptest::collection::vec(
            (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0),
            1..200,
        ),
        health in 0.0f32..=1.0,
    ) {
        let mut field = DriftField::new();
        for (w, c, s, p) in centers {
            field.update([w, c, s, p], health);
            let offsets = field.offsets();
            let total: f32 = offsets.iter().map(|o| o.abs()).sum();
            prop_assert!(total <= TOTAL_OFFSET_BUDGET + 1e-5, "total {}", total);
            for dim in Dimension::ALL {
                let (lo, hi) = offset_bounds(dim);
                let o = offsets[dim.index()];
                prop_assert!(o >= lo - 1e-5 && o <= hi + 1e-5);
            }
        }
    }

    /// Sensing is deterministic: the same inputs give the same anima.
    #[test]
    fn sensing_is_deterministic(readings in arb_readings()) {
        let cal = Calibration::default();
        let a = sense_self(&readings, &cal, None, 0.5);
        let b = sense_self(&readings, &cal, None, 0.5);
        prop_assert_eq!(a.anima, b.anima);
        prop_assert_eq!(a.raw, b.raw);
    }
}
