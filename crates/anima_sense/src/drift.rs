//! Endogenous calibration drift.
//!
//! A double-EMA per dimension tracks where the creature's attractor centre
//! actually lives: a fast inner EMA (α = 0.05) follows the attractor, a
//! very slow outer EMA (α = 0.001) follows the inner one and becomes the
//! calibration midpoint. Offsets from the hardware default are clamped
//! per-dimension and the total |offset| budget is 0.4.
//!
//! Sustained surprise (inner far from midpoint for 100+ updates) multiplies
//! the outer α by 10 for ~50 updates, decaying ×0.98 per update. After a
//! gap longer than 24 h the midpoints decay toward the last healthy values
//! with a 24 h half-life.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anima_core::{AnimaError, Dimension};

pub const INNER_ALPHA: f32 = 0.05;
pub const OUTER_ALPHA: f32 = 0.001;
pub const TOTAL_OFFSET_BUDGET: f32 = 0.4;
pub const SURPRISE_WINDOW: usize = 50;
pub const SURPRISE_STREAK_TRIGGER: u32 = 100;
pub const SURPRISE_BOOST: f32 = 10.0;
pub const SURPRISE_BOOST_UPDATES: u32 = 50;
pub const SURPRISE_BOOST_DECAY: f32 = 0.98;
pub const GAP_THRESHOLD_SECONDS: i64 = 24 * 3600;
pub const GAP_HALF_LIFE_HOURS: f32 = 24.0;
pub const HEALTHY_TRAJECTORY_THRESHOLD: f32 = 0.7;

/// Asymmetric per-dimension offset bounds (lo, hi) around the hardware
/// default of 0.5.
pub fn offset_bounds(dim: Dimension) -> (f32, f32) {
    match dim {
        Dimension::Warmth => (-0.10, 0.20),
        Dimension::Clarity => (-0.05, 0.15),
        Dimension::Stability => (-0.15, 0.15),
        Dimension::Presence => (-0.10, 0.10),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimDrift {
    pub hardware_default: f32,
    pub inner_ema: f32,
    pub outer_ema: f32,
    pub current_midpoint: f32,
    pub last_healthy: f32,
    pub outer_alpha: f32,
    /// Recent inner values for the 3σ surprise test.
    recent_inner: VecDeque<f32>,
    surprise_streak: u32,
    boost: f32,
    boost_updates_left: u32,
}

impl Default for DimDrift {
    fn default() -> Self {
        Self {
            hardware_default: 0.5,
            inner_ema: 0.5,
            outer_ema: 0.5,
            current_midpoint: 0.5,
            last_healthy: 0.5,
            outer_alpha: OUTER_ALPHA,
            recent_inner: VecDeque::with_capacity(SURPRISE_WINDOW),
            surprise_streak: 0,
            boost: 1.0,
            boost_updates_left: 0,
        }
    }
}

impl DimDrift {
    fn inner_sigma(&self) -> f32 {
        let n = self.recent_inner.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.recent_inner.iter().sum::<f32>() / n as f32;
        let var = self
            .recent_inner
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f32>()
            / n as f32;
        var.sqrt()
    }

    /// Advance the EMAs one step; returns the unclamped offset.
    fn step(&mut self, center: f32) -> f32 {
        self.inner_ema += INNER_ALPHA * (center - self.inner_ema);

        if self.recent_inner.len() == SURPRISE_WINDOW {
            self.recent_inner.pop_front();
        }
        self.recent_inner.push_back(self.inner_ema);

        // Surprise: inner persistently far from the midpoint.
        let sigma = self.inner_sigma();
        if sigma > 0.0 && (self.inner_ema - self.current_midpoint).abs() > 3.0 * sigma {
            self.surprise_streak += 1;
        } else {
            self.surprise_streak = 0;
        }
        if self.surprise_streak >= SURPRISE_STREAK_TRIGGER {
            self.boost = SURPRISE_BOOST;
            self.boost_updates_left = SURPRISE_BOOST_UPDATES;
            self.surprise_streak = 0;
            tracing::debug!("Drift surprise acceleration engaged");
        }

        let effective_alpha = if self.boost_updates_left > 0 {
            let a = self.outer_alpha * self.boost;
            self.boost *= SURPRISE_BOOST_DECAY;
            self.boost_updates_left -= 1;
            a
        } else {
            self.boost = 1.0;
            self.outer_alpha
        };

        self.outer_ema += effective_alpha * (self.inner_ema - self.outer_ema);
        self.outer_ema - self.hardware_default
    }
}

/// Drift state across all four dimensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriftField {
    pub dims: [DimDrift; 4],
}

impl DriftField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current midpoints indexed per [`Dimension`].
    pub fn midpoints(&self) -> [f32; 4] {
        let mut m = [0.5; 4];
        for dim in Dimension::ALL {
            m[dim.index()] = self.dims[dim.index()].current_midpoint;
        }
        m
    }

    /// Per-dimension offsets from hardware defaults.
    pub fn offsets(&self) -> [f32; 4] {
        let mut o = [0.0; 4];
        for dim in Dimension::ALL {
            let d = &self.dims[dim.index()];
            o[dim.index()] = d.current_midpoint - d.hardware_default;
        }
        o
    }

    /// One drift update, called on the trajectory cadence with the current
    /// attractor centre and trajectory health.
    pub fn update(&mut self, attractor_center: [f32; 4], trajectory_health: f32) {
        // Advance EMAs and collect raw offsets, clamped per-dimension.
        let mut offsets = [0.0f32; 4];
        for dim in Dimension::ALL {
            let i = dim.index();
            let raw = self.dims[i].step(attractor_center[i]);
            let (lo, hi) = offset_bounds(dim);
            offsets[i] = raw.clamp(lo, hi);
        }

        // Rescale so the total budget holds.
        let total: f32 = offsets.iter().map(|o| o.abs()).sum();
        if total > TOTAL_OFFSET_BUDGET {
            let scale = TOTAL_OFFSET_BUDGET / total;
            for o in &mut offsets {
                *o *= scale;
            }
        }

        for dim in Dimension::ALL {
            let i = dim.index();
            let d = &mut self.dims[i];
            d.current_midpoint = d.hardware_default + offsets[i];
            if trajectory_health > HEALTHY_TRAJECTORY_THRESHOLD {
                d.last_healthy = d.current_midpoint;
            }
        }
    }

    /// Decay toward the last healthy midpoints after a long gap.
    /// No-op for gaps within 24 h.
    pub fn apply_gap(&mut self, gap_seconds: i64) {
        if gap_seconds <= GAP_THRESHOLD_SECONDS {
            return;
        }
        let gap_hours = gap_seconds as f32 / 3600.0;
        let factor = 0.5f32.powf(gap_hours / GAP_HALF_LIFE_HOURS);
        for d in &mut self.dims {
            d.current_midpoint = d.last_healthy + (d.current_midpoint - d.last_healthy) * factor;
            // Resync the EMAs so the next updates continue from here.
            d.inner_ema = d.current_midpoint;
            d.outer_ema = d.current_midpoint;
        }
        tracing::info!(gap_hours, factor, "Drift decayed toward last healthy midpoints");
    }

    pub fn save(&self, path: &Path) -> Result<(), AnimaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, AnimaError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(field) => field,
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_centered() {
        let field = DriftField::new();
        assert_eq!(field.midpoints(), [0.5; 4]);
        assert_eq!(field.offsets(), [0.0; 4]);
    }

    #[test]
    fn test_drift_moves_toward_persistent_center() {
        let mut field = DriftField::new();
        // Creature living warm: attractor warmth 0.7 for a long time.
        for _ in 0..5000 {
            field.update([0.7, 0.5, 0.5, 0.5], 0.5);
        }
        let warmth_mid = field.midpoints()[Dimension::Warmth.index()];
        assert!(warmth_mid > 0.5, "midpoint should drift up: {}", warmth_mid);
        assert!(warmth_mid <= 0.7);
    }

    #[test]
    fn test_per_dim_bounds_hold() {
        let mut field = DriftField::new();
        // Extreme sustained attractor; offsets must stay bounded.
        for _ in 0..200_000 {
            field.update([1.0, 1.0, 0.0, 0.0], 0.5);
        }
        let offsets = field.offsets();
        for dim in Dimension::ALL {
            let (lo, hi) = offset_bounds(dim);
            let o = offsets[dim.index()];
            assert!(o >= lo - 1e-6 && o <= hi + 1e-6, "{}: {}", dim.as_str(), o);
        }
        let total: f32 = offsets.iter().map(|o| o.abs()).sum();
        assert!(total <= TOTAL_OFFSET_BUDGET + 1e-6, "total {}", total);
    }

    #[test]
    fn test_last_healthy_gated_on_trajectory_health() {
        let mut field = DriftField::new();
        for _ in 0..2000 {
            field.update([0.8, 0.5, 0.5, 0.5], 0.5); // unhealthy
        }
        let unhealthy_lh = field.dims[0].last_healthy;
        assert_eq!(unhealthy_lh, 0.5);
        field.update([0.8, 0.5, 0.5, 0.5], 0.9); // healthy
        assert!((field.dims[0].last_healthy - field.dims[0].current_midpoint).abs() < 1e-6);
    }

    #[test]
    fn test_gap_decay_toward_last_healthy() {
        let mut field = DriftField::new();
        field.dims[0].current_midpoint = 0.65;
        field.dims[0].last_healthy = 0.5;
        // 48 h gap: two half-lives → quarter of the distance remains
        field.apply_gap(48 * 3600);
        assert!((field.dims[0].current_midpoint - 0.5375).abs() < 1e-4);
    }

    #[test]
    fn test_short_gap_no_decay() {
        let mut field = DriftField::new();
        field.dims[0].current_midpoint = 0.65;
        field.dims[0].last_healthy = 0.5;
        field.apply_gap(3600);
        assert!((field.dims[0].current_midpoint - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration_drift.json");
        let mut field = DriftField::new();
        for _ in 0..500 {
            field.update([0.62, 0.48, 0.55, 0.51], 0.8);
        }
        field.save(&path).unwrap();
        let back = DriftField::load(&path).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let field = DriftField::load_or_default(Path::new("/nonexistent/drift.json"));
        assert_eq!(field.midpoints(), [0.5; 4]);
    }
}
