//! EISV mapping of canvas statistics and the coherence measure.
//!
//! {Energy, Integrity, Entropy, Void} here is an observation of the
//! canvas, not a control input. Integrity is sampled neighborhood
//! agreement; entropy is the normalized luminance-histogram entropy.
//! Coherence weighs integrity heaviest: a drawing "comes together" when
//! neighboring marks agree.

use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, CANVAS_SIZE};

/// Sampling stride for the integrity estimate. Full-canvas pairwise
/// comparison is wasteful at 2 s cadence; a grid sample is plenty.
const SAMPLE_STRIDE: u32 = 4;
/// Channel distance below which two neighbors "agree".
const AGREE_DISTANCE: f32 = 60.0;
const HIST_BUCKETS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eisv {
    pub energy: f32,
    pub integrity: f32,
    pub entropy: f32,
    pub void: f32,
}

impl Eisv {
    /// Compute the four quantities from the canvas.
    pub fn measure(canvas: &Canvas) -> Self {
        let coverage = canvas.coverage();
        let energy = canvas.mean_luminance();

        // Integrity: fraction of sampled neighbor pairs that agree,
        // counted only where at least one side is drawn.
        let mut pairs = 0u32;
        let mut agreeing = 0u32;
        let mut y = 0;
        while y < CANVAS_SIZE - SAMPLE_STRIDE {
            let mut x = 0;
            while x < CANVAS_SIZE - SAMPLE_STRIDE {
                let here = canvas.get(x, y);
                for (nx, ny) in [(x + SAMPLE_STRIDE, y), (x, y + SAMPLE_STRIDE)] {
                    let there = canvas.get(nx, ny);
                    let drawn =
                        here.iter().any(|&c| c > 0) || there.iter().any(|&c| c > 0);
                    if !drawn {
                        continue;
                    }
                    pairs += 1;
                    let dist = here
                        .iter()
                        .zip(there.iter())
                        .map(|(&a, &b)| (a as f32 - b as f32).abs())
                        .sum::<f32>()
                        / 3.0;
                    if dist < AGREE_DISTANCE {
                        agreeing += 1;
                    }
                }
                x += SAMPLE_STRIDE;
            }
            y += SAMPLE_STRIDE;
        }
        let integrity = if pairs == 0 {
            0.0
        } else {
            agreeing as f32 / pairs as f32
        };

        // Entropy: luminance histogram over drawn samples.
        let mut hist = [0u32; HIST_BUCKETS];
        let mut drawn_samples = 0u32;
        let mut y = 0;
        while y < CANVAS_SIZE {
            let mut x = 0;
            while x < CANVAS_SIZE {
                let p = canvas.get(x, y);
                if p.iter().any(|&c| c > 0) {
                    let lum = (p[0] as u32 + p[1] as u32 + p[2] as u32) / 3;
                    let bucket = (lum as usize * HIST_BUCKETS / 256).min(HIST_BUCKETS - 1);
                    hist[bucket] += 1;
                    drawn_samples += 1;
                }
                x += SAMPLE_STRIDE;
            }
            y += SAMPLE_STRIDE;
        }
        let entropy = if drawn_samples == 0 {
            0.0
        } else {
            let mut h = 0.0f32;
            for &count in &hist {
                if count == 0 {
                    continue;
                }
                let p = count as f32 / drawn_samples as f32;
                h -= p * p.ln();
            }
            h / (HIST_BUCKETS as f32).ln()
        };

        Self {
            energy,
            integrity,
            entropy,
            void: 1.0 - coverage,
        }
    }

    /// Coherence C ∈ [0, 1]: integrity-dominant composite.
    pub fn coherence(&self) -> f32 {
        let energy_balance = 1.0 - (self.energy - 0.5).abs() * 2.0;
        (0.5 * self.integrity + 0.3 * (1.0 - self.entropy) + 0.2 * energy_balance)
            .clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_canvas() {
        let canvas = Canvas::new("gestural");
        let eisv = Eisv::measure(&canvas);
        assert_eq!(eisv.void, 1.0);
        assert_eq!(eisv.integrity, 0.0);
        assert_eq!(eisv.entropy, 0.0);
    }

    #[test]
    fn test_uniform_fill_high_integrity_low_entropy() {
        let mut canvas = Canvas::new("field");
        for y in 0..CANVAS_SIZE {
            for x in 0..CANVAS_SIZE {
                canvas.set(x, y, [180, 90, 30]);
            }
        }
        let eisv = Eisv::measure(&canvas);
        assert!(eisv.integrity > 0.95, "integrity {}", eisv.integrity);
        assert!(eisv.entropy < 0.1, "entropy {}", eisv.entropy);
        assert!(eisv.void < 0.01);
    }

    #[test]
    fn test_noise_low_integrity_high_entropy() {
        let mut canvas = Canvas::new("pointillist");
        // Deterministic pseudo-noise.
        let mut seed: u64 = 7;
        for y in 0..CANVAS_SIZE {
            for x in 0..CANVAS_SIZE {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let v = (seed % 256) as u8;
                canvas.set(x, y, [v, v.wrapping_mul(3), v.wrapping_mul(7)]);
            }
        }
        let eisv = Eisv::measure(&canvas);
        assert!(eisv.entropy > 0.7, "entropy {}", eisv.entropy);
        let uniform = {
            let mut c = Canvas::new("field");
            for y in 0..CANVAS_SIZE {
                for x in 0..CANVAS_SIZE {
                    c.set(x, y, [180, 90, 30]);
                }
            }
            Eisv::measure(&c)
        };
        assert!(eisv.integrity < uniform.integrity);
        assert!(eisv.coherence() < uniform.coherence());
    }

    #[test]
    fn test_coherence_in_unit_range() {
        for (e, i, h, v) in [
            (0.0, 0.0, 0.0, 1.0),
            (1.0, 1.0, 1.0, 0.0),
            (0.5, 0.8, 0.2, 0.3),
        ] {
            let eisv = Eisv {
                energy: e,
                integrity: i,
                entropy: h,
                void: v,
            };
            let c = eisv.coherence();
            assert!((0.0..=1.0).contains(&c));
        }
    }
}
