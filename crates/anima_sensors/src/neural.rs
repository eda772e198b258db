//! Computational "EEG" bands derived from system metrics.
//!
//! Pure functions of cpu/mem/io: a neural contribution to anima without
//! hardware EEG. While the drawing engine is active, the hardware bands are
//! blended 60/40 with bands derived from the creative phase.

use anima_core::{NeuralBands, SensorReadings};

/// Fraction of creative-phase bands mixed in while drawing.
pub const CREATIVE_BLEND: f32 = 0.4;

/// Derive the five band powers from system metrics. Inputs as percentages
/// (0–100) except `cpu_freq_norm` which is already a fraction. Missing
/// inputs default to mid-scale.
pub fn derive_bands(readings: &SensorReadings) -> NeuralBands {
    let cpu = readings.cpu_pct.map(|v| v / 100.0).unwrap_or(0.5).clamp(0.0, 1.0);
    let mem = readings.mem_pct.map(|v| v / 100.0).unwrap_or(0.5).clamp(0.0, 1.0);
    let io = readings.io_wait_pct.map(|v| v / 100.0).unwrap_or(0.0).clamp(0.0, 1.0);
    let freq = readings.cpu_freq_norm.unwrap_or(0.5).clamp(0.0, 1.0);

    let mut bands = NeuralBands {
        // Deep rest: both cpu and memory quiet.
        delta: 0.6 * (1.0 - cpu) + 0.4 * (1.0 - mem),
        // Drowsy churn: io-wait dominates; saturate quickly since io-wait
        // rarely exceeds ~20% on an SBC.
        theta: (io * 5.0).min(1.0),
        // Relaxed wakefulness: free memory.
        alpha: 1.0 - mem,
        // Active processing: cpu load.
        beta: cpu,
        // High-frequency burst: load and clock speed together.
        gamma: 0.5 * cpu + 0.5 * freq,
    };
    bands.normalize();
    bands
}

/// Blend hardware-derived bands with creative-phase bands while drawing.
pub fn blend_creative(hardware: &NeuralBands, creative: &NeuralBands) -> NeuralBands {
    hardware.lerp(creative, CREATIVE_BLEND)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(cpu: f32, mem: f32, io: f32, freq: f32) -> SensorReadings {
        SensorReadings {
            cpu_pct: Some(cpu),
            mem_pct: Some(mem),
            io_wait_pct: Some(io),
            cpu_freq_norm: Some(freq),
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_machine_high_delta() {
        let bands = derive_bands(&readings(2.0, 20.0, 0.0, 0.3));
        assert!(bands.delta > 0.8);
        assert!(bands.beta < 0.1);
        assert!(bands.theta < 0.05);
    }

    #[test]
    fn test_busy_machine_high_beta_gamma() {
        let bands = derive_bands(&readings(95.0, 80.0, 2.0, 1.0));
        assert!(bands.beta > 0.9);
        assert!(bands.gamma > 0.9);
        assert!(bands.delta < 0.15);
    }

    #[test]
    fn test_io_bound_high_theta() {
        let bands = derive_bands(&readings(30.0, 40.0, 25.0, 0.5));
        assert_eq!(bands.theta, 1.0);
    }

    #[test]
    fn test_missing_metrics_mid_scale() {
        let bands = derive_bands(&SensorReadings::default());
        assert!((bands.beta - 0.5).abs() < 1e-6);
        assert!((bands.alpha - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_all_bands_in_range() {
        for cpu in [0.0, 50.0, 100.0] {
            for io in [0.0, 50.0, 100.0] {
                let b = derive_bands(&readings(cpu, 50.0, io, 0.5));
                for v in [b.delta, b.theta, b.alpha, b.beta, b.gamma] {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_creative_blend_ratio() {
        let hw = NeuralBands {
            delta: 0.0,
            theta: 0.0,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
        };
        let creative = NeuralBands {
            delta: 1.0,
            theta: 1.0,
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
        };
        let blended = blend_creative(&hw, &creative);
        assert!((blended.delta - CREATIVE_BLEND).abs() < 1e-6);
    }
}
