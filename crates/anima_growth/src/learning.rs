//! Adaptive calibration: derive new sensor ranges from lived experience.
//!
//! Needs at least 50 observations from the last 7 days. New targets come
//! from robust percentiles of the recent window and are blended at most
//! 15% toward the target per cycle, so one odd week can't yank the
//! creature's sense of normal.

use anima_core::{Calibration, SensorReadings};

pub const MIN_OBSERVATIONS: usize = 50;
/// Query window over state history.
pub const WINDOW_SECONDS: i64 = 7 * 24 * 3600;
/// Maximum fraction moved toward the new target per cycle.
pub const BLEND_RATE: f32 = 0.15;
const LOW_PCT: f32 = 0.10;
const HIGH_PCT: f32 = 0.90;

/// Percentile over a copy of the values (nearest-rank).
fn percentile(values: &[f32], pct: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((sorted.len() - 1) as f32 * pct).round() as usize;
    Some(sorted[rank.min(sorted.len() - 1)])
}

fn blend(current: f32, target: f32) -> f32 {
    current + BLEND_RATE * (target - current)
}

#[derive(Debug, Default)]
pub struct Learner;

impl Learner {
    /// Whether enough recent experience exists to adapt from.
    pub fn can_learn(observation_count: usize) -> bool {
        observation_count >= MIN_OBSERVATIONS
    }

    /// Derive an adapted calibration from the recent window. Returns
    /// `None` when there isn't enough data; the current calibration stays.
    pub fn adapt_calibration(
        observations: &[SensorReadings],
        current: &Calibration,
    ) -> Option<Calibration> {
        if !Self::can_learn(observations.len()) {
            return None;
        }

        let ambient: Vec<f32> = observations.iter().filter_map(|r| r.ambient_temp_c).collect();
        let pressure: Vec<f32> = observations.iter().filter_map(|r| r.pressure_hpa).collect();
        let humidity: Vec<f32> = observations.iter().filter_map(|r| r.humidity_pct).collect();

        let mut next = current.clone();

        if ambient.len() >= MIN_OBSERVATIONS / 2 {
            if let (Some(lo), Some(hi)) = (
                percentile(&ambient, LOW_PCT),
                percentile(&ambient, HIGH_PCT),
            ) {
                // Keep a sane span even if the window was very uniform.
                if hi - lo > 0.5 {
                    next.ambient_temp_min = blend(current.ambient_temp_min, lo);
                    next.ambient_temp_max = blend(current.ambient_temp_max, hi);
                }
            }
        }
        if let Some(p50) = percentile(&pressure, 0.5) {
            next.pressure_ideal_hpa = blend(current.pressure_ideal_hpa, p50);
        }
        if let Some(h50) = percentile(&humidity, 0.5) {
            next.humidity_ideal_pct = blend(current.humidity_ideal_pct, h50);
        }

        match next.validate() {
            Ok(()) => Some(next),
            Err(e) => {
                tracing::warn!("Adapted calibration rejected: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(ambient_lo: f32, ambient_hi: f32, n: usize) -> Vec<SensorReadings> {
        (0..n)
            .map(|i| {
                let f = i as f32 / (n - 1) as f32;
                SensorReadings {
                    ambient_temp_c: Some(ambient_lo + f * (ambient_hi - ambient_lo)),
                    pressure_hpa: Some(1008.0),
                    humidity_pct: Some(50.0),
                    ..Default::default()
                }
            })
            .collect()
    }

    #[test]
    fn test_too_few_observations() {
        let obs = observations(18.0, 22.0, 40);
        assert!(Learner::adapt_calibration(&obs, &Calibration::default()).is_none());
    }

    #[test]
    fn test_learning_moves_toward_lived_range() {
        // A week lived at 18-22 °C pulls the ambient range toward it,
        // each bound moving at most 15% of the distance per cycle.
        let obs = observations(18.0, 22.0, 50);
        let current = Calibration::default(); // [15, 28]
        let next = Learner::adapt_calibration(&obs, &current).unwrap();

        assert!(next.ambient_temp_min > current.ambient_temp_min);
        assert!(next.ambient_temp_max < current.ambient_temp_max);

        // Bounded movement: no more than 15% of the distance per cycle.
        let max_min_move = BLEND_RATE * (18.4 - current.ambient_temp_min).abs() + 1e-3;
        assert!((next.ambient_temp_min - current.ambient_temp_min).abs() <= max_min_move);
    }

    #[test]
    fn test_repeated_cycles_converge() {
        let obs = observations(18.0, 22.0, 100);
        let mut cal = Calibration::default();
        for _ in 0..60 {
            if let Some(next) = Learner::adapt_calibration(&obs, &cal) {
                cal = next;
            }
        }
        // Converged near the lived 10th/90th percentiles.
        assert!((cal.ambient_temp_min - 18.4).abs() < 0.5, "{}", cal.ambient_temp_min);
        assert!((cal.ambient_temp_max - 21.6).abs() < 0.5, "{}", cal.ambient_temp_max);
    }

    #[test]
    fn test_pressure_humidity_follow_median() {
        let obs = observations(18.0, 22.0, 50);
        let current = Calibration::default();
        let next = Learner::adapt_calibration(&obs, &current).unwrap();
        assert!(next.pressure_ideal_hpa < current.pressure_ideal_hpa); // toward 1008
        assert!(next.humidity_ideal_pct > current.humidity_ideal_pct); // toward 50
    }

    #[test]
    fn test_missing_sensors_leave_fields() {
        let obs: Vec<SensorReadings> = (0..60)
            .map(|_| SensorReadings {
                pressure_hpa: Some(1010.0),
                ..Default::default()
            })
            .collect();
        let current = Calibration::default();
        let next = Learner::adapt_calibration(&obs, &current).unwrap();
        // No ambient data → ambient range untouched.
        assert_eq!(next.ambient_temp_min, current.ambient_temp_min);
        assert_eq!(next.ambient_temp_max, current.ambient_temp_max);
    }

    #[test]
    fn test_result_always_valid() {
        let obs = observations(-30.0, 50.0, 80);
        if let Some(next) = Learner::adapt_calibration(&obs, &Calibration::default()) {
            next.validate().unwrap();
        }
    }
}
