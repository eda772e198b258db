//! Property-based tests for anima_core.
//!
//! Verifies the invariants that must hold for ALL inputs, not just
//! hand-picked examples: anima values always in [0,1], calibration patches
//! never leave an invalid calibration behind, snapshots survive the
//! serialization boundary.

use proptest::prelude::*;

use anima_core::{
    Anima, Calibration, CalibrationPatch, Dimension, Mood, NeuralBands, SensorReadings,
};

fn arb_anima() -> impl Strategy<Value = Anima> {
    (any::<f32>(), any::<f32>(), any::<f32>(), any::<f32>())
        .prop_map(|(w, c, s, p)| Anima::new(w, c, s, p))
}

proptest! {
    /// **Core invariant**: construction from arbitrary floats always yields
    /// values in [0, 1], never NaN.
    #[test]
    fn anima_always_in_unit_range(a in arb_anima()) {
        for dim in Dimension::ALL {
            let v = a.get(dim);
            prop_assert!(v.is_finite());
            prop_assert!((0.0..=1.0).contains(&v), "{} out of range: {}", dim.as_str(), v);
        }
    }

    /// Mood derivation is total: every valid anima maps to some mood.
    #[test]
    fn mood_is_total(a in arb_anima()) {
        let _ = Mood::from_anima(&a);
    }

    /// set() preserves the invariant even with hostile input.
    #[test]
    fn anima_set_preserves_range(mut a in arb_anima(), v in any::<f32>()) {
        a.set(Dimension::Clarity, v);
        prop_assert!(a.clarity.is_finite() && (0.0..=1.0).contains(&a.clarity));
    }

    /// A patch either applies and validates, or errors and changes nothing.
    #[test]
    fn calibration_patch_never_corrupts(
        t_min in -50.0f32..60.0,
        t_max in -50.0f32..60.0,
        pressure in 500.0f32..1500.0,
        humidity in -20.0f32..120.0,
    ) {
        let cal = Calibration::default();
        let patch = CalibrationPatch {
            ambient_temp_min: Some(t_min),
            ambient_temp_max: Some(t_max),
            pressure_ideal_hpa: Some(pressure),
            humidity_ideal_pct: Some(humidity),
            ..Default::default()
        };
        match cal.apply_patch(&patch) {
            Ok(next) => prop_assert!(next.validate().is_ok()),
            Err(_) => prop_assert!(cal.validate().is_ok()),
        }
    }

    /// JSON round-trip of anima within float tolerance.
    #[test]
    fn anima_json_roundtrip(a in arb_anima()) {
        let json = serde_json::to_string(&a).unwrap();
        let back: Anima = serde_json::from_str(&json).unwrap();
        for dim in Dimension::ALL {
            prop_assert!((back.get(dim) - a.get(dim)).abs() < 1e-6);
        }
    }

    /// Band lerp stays in [0, 1] for in-range inputs.
    #[test]
    fn bands_lerp_in_range(
        a in 0.0f32..=1.0, b in 0.0f32..=1.0, c in 0.0f32..=1.0,
        d in 0.0f32..=1.0, e in 0.0f32..=1.0, t in any::<f32>(),
    ) {
        let x = NeuralBands { delta: a, theta: b, alpha: c, beta: d, gamma: e };
        let y = NeuralBands::default();
        let z = x.lerp(&y, t);
        for v in [z.delta, z.theta, z.alpha, z.beta, z.gamma] {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    /// available() length always matches the number of present fields.
    #[test]
    fn readings_available_consistent(
        cpu in proptest::option::of(0.0f32..100.0),
        ambient in proptest::option::of(-10.0f32..40.0),
        lux in proptest::option::of(0.0f32..10000.0),
    ) {
        let r = SensorReadings {
            cpu_temp_c: cpu,
            ambient_temp_c: ambient,
            light_lux: lux,
            ..Default::default()
        };
        let expected =
            cpu.is_some() as usize + ambient.is_some() as usize + lux.is_some() as usize;
        prop_assert_eq!(r.available().len(), expected);
    }
}
