//! Meta-weighting: which preferences deserve influence.
//!
//! Roughly daily, compute trajectory health, correlate each dimension's
//! lagged satisfaction with future health, and nudge influence weights by
//! `w ← w·(1 + 0.005·corr)`. Conservation (Σ = 4.0, floor 0.3) is enforced
//! by `Preferences::set_weights`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use anima_core::Dimension;

use crate::preferences::Preferences;

pub const HEALTH_W_SATISFACTION: f32 = 0.30;
pub const HEALTH_W_VARIANCE: f32 = 0.25;
pub const HEALTH_W_EFFICACY: f32 = 0.25;
pub const HEALTH_W_PREDICTION: f32 = 0.20;
pub const META_LEARNING_RATE: f32 = 0.005;
/// Cycles of history kept for the lagged correlation.
pub const SAMPLE_CAP: usize = 60;
const MIN_SAMPLES: usize = 5;

/// Composite trajectory health in [0, 1].
///
/// `prediction_trend` is in [-0.5, 0.5] (improving vs worsening
/// prediction error); the other inputs are already unit-scaled.
pub fn trajectory_health(
    mean_satisfaction: f32,
    satisfaction_variance: f32,
    action_efficacy: f32,
    prediction_trend: f32,
) -> f32 {
    let variance_term = 1.0 - (4.0 * satisfaction_variance).min(1.0);
    let h = HEALTH_W_SATISFACTION * mean_satisfaction.clamp(0.0, 1.0)
        + HEALTH_W_VARIANCE * variance_term
        + HEALTH_W_EFFICACY * action_efficacy.clamp(0.0, 1.0)
        + HEALTH_W_PREDICTION * (prediction_trend.clamp(-0.5, 0.5) + 0.5);
    h.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct CycleSample {
    satisfaction: [f32; 4],
    health: f32,
}

/// Accumulates one sample per meta cycle and periodically re-weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaWeighting {
    samples: VecDeque<CycleSample>,
}

impl MetaWeighting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Record this cycle's per-dimension satisfaction and overall health.
    pub fn record(&mut self, satisfaction: [f32; 4], health: f32) {
        if self.samples.len() == SAMPLE_CAP {
            self.samples.pop_front();
        }
        self.samples.push_back(CycleSample {
            satisfaction,
            health,
        });
    }

    /// Pearson correlation between a dimension's satisfaction at cycle t
    /// and health at cycle t+1.
    fn lagged_correlation(&self, dim: usize) -> f32 {
        let n = self.samples.len();
        if n < MIN_SAMPLES {
            return 0.0;
        }
        let xs: Vec<f32> = self
            .samples
            .iter()
            .take(n - 1)
            .map(|s| s.satisfaction[dim])
            .collect();
        let ys: Vec<f32> = self.samples.iter().skip(1).map(|s| s.health).collect();

        let m = xs.len() as f32;
        let mean_x = xs.iter().sum::<f32>() / m;
        let mean_y = ys.iter().sum::<f32>() / m;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (x, y) in xs.iter().zip(ys.iter()) {
            cov += (x - mean_x) * (y - mean_y);
            var_x += (x - mean_x).powi(2);
            var_y += (y - mean_y).powi(2);
        }
        if var_x <= 1e-9 || var_y <= 1e-9 {
            return 0.0;
        }
        (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
    }

    /// Run the weighting update against the preferences.
    pub fn reweigh(&self, prefs: &mut Preferences) {
        if self.samples.len() < MIN_SAMPLES {
            return;
        }
        let current = prefs.weights();
        let mut next = [0.0f32; 4];
        for dim in Dimension::ALL {
            let i = dim.index();
            let corr = self.lagged_correlation(i);
            next[i] = current[i] * (1.0 + META_LEARNING_RATE * corr);
        }
        prefs.set_weights(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_all_good() {
        let h = trajectory_health(1.0, 0.0, 1.0, 0.5);
        assert!((h - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_health_all_bad() {
        let h = trajectory_health(0.0, 1.0, 0.0, -0.5);
        assert!(h < 1e-6);
    }

    #[test]
    fn test_health_weights_sum() {
        // Mid inputs land exactly on the weighted midpoint.
        let h = trajectory_health(0.5, 0.125, 0.5, 0.0);
        assert!((h - (0.30 * 0.5 + 0.25 * 0.5 + 0.25 * 0.5 + 0.20 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_correlated_dimension_gains_weight() {
        let mut meta = MetaWeighting::new();
        // Warmth satisfaction perfectly predicts next-cycle health;
        // others are flat (zero variance → zero correlation).
        for i in 0..30 {
            let s = (i % 10) as f32 / 10.0;
            meta.record([s, 0.5, 0.5, 0.5], s);
        }
        let mut prefs = Preferences::new();
        let before = prefs.weights();
        meta.reweigh(&mut prefs);
        let after = prefs.weights();
        assert!(
            after[0] > before[0],
            "warmth weight should rise: {} -> {}",
            before[0],
            after[0]
        );
        // Conservation holds.
        let sum: f32 = after.iter().sum();
        assert!((sum - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_too_few_samples_no_change() {
        let mut meta = MetaWeighting::new();
        meta.record([0.5; 4], 0.5);
        let mut prefs = Preferences::new();
        let before = prefs.weights();
        meta.reweigh(&mut prefs);
        assert_eq!(prefs.weights(), before);
    }

    #[test]
    fn test_sample_cap() {
        let mut meta = MetaWeighting::new();
        for _ in 0..100 {
            meta.record([0.5; 4], 0.5);
        }
        assert_eq!(meta.sample_count(), SAMPLE_CAP);
    }
}
