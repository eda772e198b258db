//! The sensing pipeline: readings → anima.
//!
//! Each dimension is a weighted sum of normalized contributors. Missing
//! contributors substitute 0.5 and charge a confidence penalty that lands
//! on clarity. The drifted midpoints shift where "neutral" sits; the raw
//! (pre-drift) values are kept alongside for the tension detector, so
//! drift can never mask a real conflict.

use anima_core::{Anima, Calibration, Dimension, SensorReadings};

/// Result of one sensing pass.
#[derive(Debug, Clone)]
pub struct Sensed {
    /// Midpoint-adjusted anima: what the creature feels.
    pub anima: Anima,
    /// Pre-drift anima: what the sensors actually said.
    pub raw: Anima,
    /// Fraction of contributors that were present, [0, 1].
    pub confidence: f32,
}

/// Normalize a value into [0, 1] over a calibration range.
fn norm(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Weber-Fechner log mapping of lux against the calibration reference.
fn log_light(world_lux: f32, ref_lux: f32) -> f32 {
    if ref_lux <= 0.0 {
        return 0.5;
    }
    ((1.0 + world_lux.max(0.0)).ln() / (1.0 + ref_lux).ln()).clamp(0.0, 1.0)
}

/// Tracks contributors for the confidence penalty.
struct Contributors {
    present: u32,
    total: u32,
}

impl Contributors {
    fn new() -> Self {
        Self {
            present: 0,
            total: 0,
        }
    }

    /// Count a contributor; missing ones read as the 0.5 fallback.
    fn take(&mut self, value: Option<f32>) -> f32 {
        self.total += 1;
        match value {
            Some(v) => {
                self.present += 1;
                v
            }
            None => 0.5,
        }
    }

    fn confidence(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.present as f32 / self.total as f32
    }
}

/// Shift a raw value by the drifted midpoint: a creature whose "home"
/// warmth has drifted up feels the same raw warmth as closer to neutral.
fn apply_midpoint(raw: f32, midpoint: f32) -> f32 {
    (raw - (midpoint - 0.5)).clamp(0.0, 1.0)
}

/// Compute anima from one tick of readings.
///
/// `midpoints` are the drifted calibration midpoints indexed per
/// [`Dimension`]; `None` means hardware defaults (0.5 everywhere).
/// `interaction_trend` in [0, 1] is the recency-of-interaction signal the
/// activity manager maintains.
pub fn sense_self(
    readings: &SensorReadings,
    cal: &Calibration,
    midpoints: Option<&[f32; 4]>,
    interaction_trend: f32,
) -> Sensed {
    let mut c = Contributors::new();
    let bands = readings.bands;
    let w = &cal.weights;

    // Warmth: thermal and computational heat.
    let cpu_temp_n = norm(
        c.take(readings.cpu_temp_c),
        cal.cpu_temp_min,
        cal.cpu_temp_max,
    );
    let cpu_load_n = (c.take(readings.cpu_pct) / 100.0).clamp(0.0, 1.0);
    let ambient_n = norm(
        c.take(readings.ambient_temp_c),
        cal.ambient_temp_min,
        cal.ambient_temp_max,
    );
    let beta = c.take(bands.map(|b| b.beta));
    let warmth = w.warmth.cpu_temp * cpu_temp_n
        + w.warmth.cpu_load * cpu_load_n
        + w.warmth.ambient_temp * ambient_n
        + w.warmth.neural_beta * beta;

    // Clarity: world light (log-mapped), sensor coverage, neural alpha.
    // world_light_lux must be the smoothed, LED-corrected value.
    let light_n = log_light(c.take(readings.world_light_lux), cal.light_ref_lux);
    let coverage = readings.coverage();
    let alpha = c.take(bands.map(|b| b.alpha));
    let clarity_base = w.clarity.light * light_n
        + w.clarity.coverage * coverage
        + w.clarity.neural_alpha * alpha;

    // Stability: inverse deviation from environmental ideals.
    let humidity = c.take(readings.humidity_pct);
    let humidity_ok = 1.0 - ((humidity - cal.humidity_ideal_pct).abs() / 50.0).clamp(0.0, 1.0);
    let pressure = c.take(readings.pressure_hpa);
    let pressure_ok = 1.0 - ((pressure - cal.pressure_ideal_hpa).abs() / 50.0).clamp(0.0, 1.0);
    let temp_mid = (cal.ambient_temp_min + cal.ambient_temp_max) / 2.0;
    let temp_half = ((cal.ambient_temp_max - cal.ambient_temp_min) / 2.0).max(0.1);
    let ambient_for_dev = readings.ambient_temp_c.unwrap_or(temp_mid);
    let temp_ok = 1.0 - ((ambient_for_dev - temp_mid).abs() / temp_half).clamp(0.0, 1.0);
    let delta = c.take(bands.map(|b| b.delta));
    let stability = w.stability.humidity_dev * humidity_ok
        + w.stability.pressure_dev * pressure_ok
        + w.stability.temp_dev * temp_ok
        + w.stability.neural_delta * delta;

    // Presence: headroom, interaction recency, neural gamma.
    let cpu_frac = readings.cpu_pct.map(|v| v / 100.0).unwrap_or(0.5);
    let mem_frac = readings.mem_pct.map(|v| v / 100.0).unwrap_or(0.5);
    let headroom = (1.0 - cpu_frac.max(mem_frac)).clamp(0.0, 1.0);
    let gamma = c.take(bands.map(|b| b.gamma));
    let presence = w.presence.headroom * headroom
        + w.presence.interaction * interaction_trend.clamp(0.0, 1.0)
        + w.presence.neural_gamma * gamma;

    // Missing contributors dent clarity, the dimension that represents
    // how well the creature can see, itself included.
    let confidence = c.confidence();
    let clarity = clarity_base * (0.6 + 0.4 * confidence);

    let raw = Anima::new(warmth, clarity, stability, presence);

    let anima = match midpoints {
        Some(m) => {
            let mut shifted = raw;
            for dim in Dimension::ALL {
                shifted.set(dim, apply_midpoint(raw.get(dim), m[dim.index()]));
            }
            shifted
        }
        None => raw,
    };

    Sensed {
        anima,
        raw,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::NeuralBands;

    fn full_readings() -> SensorReadings {
        SensorReadings {
            cpu_temp_c: Some(50.0),
            ambient_temp_c: Some(21.5),
            humidity_pct: Some(45.0),
            pressure_hpa: Some(1013.0),
            light_lux: Some(400.0),
            world_light_lux: Some(380.0),
            cpu_pct: Some(20.0),
            mem_pct: Some(40.0),
            io_wait_pct: Some(1.0),
            cpu_freq_norm: Some(0.5),
            bands: Some(NeuralBands::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_readings_full_confidence() {
        let sensed = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        assert!((sensed.confidence - 1.0).abs() < 1e-6);
        for dim in Dimension::ALL {
            let v = sensed.anima.get(dim);
            assert!((0.0..=1.0).contains(&v), "{}: {}", dim.as_str(), v);
        }
    }

    #[test]
    fn test_ideal_environment_high_stability() {
        let sensed = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        assert!(sensed.anima.stability > 0.7, "{}", sensed.anima.stability);
    }

    #[test]
    fn test_missing_sensors_reduce_clarity() {
        let full = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        let mut degraded_readings = full_readings();
        degraded_readings.humidity_pct = None;
        degraded_readings.pressure_hpa = None;
        degraded_readings.ambient_temp_c = None;
        let degraded = sense_self(&degraded_readings, &Calibration::default(), None, 0.5);
        assert!(degraded.confidence < full.confidence);
        assert!(degraded.anima.clarity < full.anima.clarity);
    }

    #[test]
    fn test_empty_readings_never_nan() {
        let sensed = sense_self(&SensorReadings::default(), &Calibration::default(), None, 0.0);
        for dim in Dimension::ALL {
            assert!(sensed.anima.get(dim).is_finite());
        }
    }

    #[test]
    fn test_hot_cpu_raises_warmth() {
        let mut hot = full_readings();
        hot.cpu_temp_c = Some(74.0);
        hot.cpu_pct = Some(95.0);
        let cool = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        let heated = sense_self(&hot, &Calibration::default(), None, 0.5);
        assert!(heated.anima.warmth > cool.anima.warmth);
    }

    #[test]
    fn test_midpoint_shift_lowers_sensed_value() {
        // Midpoint drifted up: same raw warmth feels cooler.
        let midpoints = [0.6, 0.5, 0.5, 0.5];
        let plain = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        let drifted = sense_self(
            &full_readings(),
            &Calibration::default(),
            Some(&midpoints),
            0.5,
        );
        assert!((drifted.anima.warmth - (plain.anima.warmth - 0.1)).abs() < 1e-5);
        // Raw is unaffected by drift.
        assert!((drifted.raw.warmth - plain.raw.warmth).abs() < 1e-6);
    }

    #[test]
    fn test_dark_room_low_clarity_light_term() {
        let mut dark = full_readings();
        dark.world_light_lux = Some(0.0);
        let bright = sense_self(&full_readings(), &Calibration::default(), None, 0.5);
        let dim = sense_self(&dark, &Calibration::default(), None, 0.5);
        assert!(dim.anima.clarity < bright.anima.clarity);
    }

    #[test]
    fn test_log_light_reference_point() {
        assert!((log_light(400.0, 400.0) - 1.0).abs() < 1e-6);
        assert_eq!(log_light(0.0, 400.0), 0.0);
        // Log curve: half the lux loses far less than half the clarity
        assert!(log_light(200.0, 400.0) > 0.85);
    }
}
