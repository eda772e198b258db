//! Property-based tests for the canvas and coherence.

use proptest::prelude::*;

use anima_drawing::{Canvas, Eisv, CANVAS_SIZE};

proptest! {
    /// Mark count is monotonically non-decreasing between clears, whatever
    /// the gesture stream does.
    #[test]
    fn marks_monotonic_between_clears(
        marks in proptest::collection::vec(
            (0u32..CANVAS_SIZE + 20, 0u32..CANVAS_SIZE + 20, any::<u8>()),
            1..200,
        ),
    ) {
        let mut canvas = Canvas::new("gestural");
        let mut last = 0;
        for (x, y, v) in marks {
            canvas.set(x, y, [v, v / 2, v / 4]);
            prop_assert!(canvas.pixels_drawn() >= last);
            last = canvas.pixels_drawn();
        }
        canvas.clear();
        prop_assert_eq!(canvas.pixels_drawn(), 0);
    }

    /// EISV quantities and coherence stay in [0, 1] for arbitrary canvases.
    #[test]
    fn eisv_always_unit_range(
        marks in proptest::collection::vec(
            (0u32..CANVAS_SIZE, 0u32..CANVAS_SIZE, any::<u8>(), any::<u8>(), any::<u8>()),
            0..300,
        ),
    ) {
        let mut canvas = Canvas::new("field");
        for (x, y, r, g, b) in marks {
            canvas.set(x, y, [r, g, b]);
        }
        let eisv = Eisv::measure(&canvas);
        for v in [eisv.energy, eisv.integrity, eisv.entropy, eisv.void] {
            prop_assert!(v.is_finite() && (0.0..=1.0).contains(&v));
        }
        let c = eisv.coherence();
        prop_assert!((0.0..=1.0).contains(&c));
    }

    /// Snapshot round-trip preserves the canvas exactly.
    #[test]
    fn snapshot_roundtrip_exact(
        marks in proptest::collection::vec(
            (0u32..CANVAS_SIZE, 0u32..CANVAS_SIZE, any::<u8>()),
            0..100,
        ),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.json");
        let mut canvas = Canvas::new("pointillist");
        for (x, y, v) in marks {
            canvas.set(x, y, [v, v, v]);
        }
        canvas.save(&path).unwrap();
        let back = Canvas::load(&path).unwrap();
        prop_assert_eq!(back, canvas);
    }
}
