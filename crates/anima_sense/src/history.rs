//! Rolling anima history and the attractor basin.
//!
//! A bounded deque of timestamped anima points. The attractor basin
//! (mean and covariance over a recent window) is the creature's "home"
//! in state space, consumed by drift, trajectory and the schema hub.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anima_core::{Anima, AnimaError};

pub const HISTORY_CAP: usize = 1000;
pub const BASIN_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimaPoint {
    pub at: i64,
    pub warmth: f32,
    pub clarity: f32,
    pub stability: f32,
    pub presence: f32,
}

impl AnimaPoint {
    pub fn new(at: i64, anima: &Anima) -> Self {
        Self {
            at,
            warmth: anima.warmth,
            clarity: anima.clarity,
            stability: anima.stability,
            presence: anima.presence,
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.warmth, self.clarity, self.stability, self.presence]
    }
}

/// Mean and covariance of recent anima points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractorBasin {
    pub mean: [f32; 4],
    pub covariance: [[f32; 4]; 4],
    pub samples: usize,
}

impl AttractorBasin {
    /// Sum of per-dimension variances: the basin's spread.
    pub fn total_variance(&self) -> f32 {
        (0..4).map(|i| self.covariance[i][i]).sum()
    }
}

impl Default for AttractorBasin {
    fn default() -> Self {
        Self {
            mean: [0.5; 4],
            covariance: [[0.0; 4]; 4],
            samples: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimaHistory {
    points: VecDeque<AnimaPoint>,
}

impl AnimaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: i64, anima: &Anima) {
        if self.points.len() == HISTORY_CAP {
            self.points.pop_front();
        }
        self.points.push_back(AnimaPoint::new(at, anima));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&AnimaPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimaPoint> {
        self.points.iter()
    }

    /// Mean and covariance over the last `window` points. With no data,
    /// the basin sits at the homeostatic default.
    pub fn attractor_basin(&self, window: usize) -> AttractorBasin {
        let n = self.points.len().min(window);
        if n == 0 {
            return AttractorBasin::default();
        }
        let recent: Vec<[f32; 4]> = self
            .points
            .iter()
            .rev()
            .take(n)
            .map(|p| p.as_array())
            .collect();

        let mut mean = [0.0f32; 4];
        for p in &recent {
            for i in 0..4 {
                mean[i] += p[i];
            }
        }
        for m in &mut mean {
            *m /= n as f32;
        }

        let mut covariance = [[0.0f32; 4]; 4];
        if n > 1 {
            for p in &recent {
                for i in 0..4 {
                    for j in 0..4 {
                        covariance[i][j] += (p[i] - mean[i]) * (p[j] - mean[j]);
                    }
                }
            }
            for row in &mut covariance {
                for c in row.iter_mut() {
                    *c /= (n - 1) as f32;
                }
            }
        }

        AttractorBasin {
            mean,
            covariance,
            samples: n,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AnimaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_or_default(path: &Path) -> Self {
        fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_enforced() {
        let mut h = AnimaHistory::new();
        for t in 0..1200 {
            h.push(t, &Anima::neutral());
        }
        assert_eq!(h.len(), HISTORY_CAP);
        // Oldest entries evicted.
        assert_eq!(h.iter().next().unwrap().at, 200);
    }

    #[test]
    fn test_empty_basin_default() {
        let h = AnimaHistory::new();
        let basin = h.attractor_basin(BASIN_WINDOW);
        assert_eq!(basin.mean, [0.5; 4]);
        assert_eq!(basin.samples, 0);
    }

    #[test]
    fn test_constant_points_zero_variance() {
        let mut h = AnimaHistory::new();
        let a = Anima::new(0.6, 0.4, 0.7, 0.5);
        for t in 0..50 {
            h.push(t, &a);
        }
        let basin = h.attractor_basin(BASIN_WINDOW);
        assert!((basin.mean[0] - 0.6).abs() < 1e-6);
        assert!(basin.total_variance() < 1e-9);
    }

    #[test]
    fn test_basin_window_limits_samples() {
        let mut h = AnimaHistory::new();
        // 200 cold points then 100 warm ones.
        for t in 0..200 {
            h.push(t, &Anima::new(0.2, 0.5, 0.5, 0.5));
        }
        for t in 200..300 {
            h.push(t, &Anima::new(0.8, 0.5, 0.5, 0.5));
        }
        let basin = h.attractor_basin(100);
        assert_eq!(basin.samples, 100);
        assert!((basin.mean[0] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_covariance_sign() {
        let mut h = AnimaHistory::new();
        // Warmth and clarity move together; stability moves opposite.
        for t in 0..100 {
            let f = (t as f32 / 100.0) * 0.4;
            h.push(t, &Anima::new(0.3 + f, 0.3 + f, 0.7 - f, 0.5));
        }
        let basin = h.attractor_basin(100);
        assert!(basin.covariance[0][1] > 0.0);
        assert!(basin.covariance[0][2] < 0.0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anima_history.json");
        let mut h = AnimaHistory::new();
        for t in 0..10 {
            h.push(t, &Anima::new(0.6, 0.5, 0.4, 0.7));
        }
        h.save(&path).unwrap();
        let back = AnimaHistory::load_or_default(&path);
        assert_eq!(back, h);
    }
}
