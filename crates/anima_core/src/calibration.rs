//! Tunable sensor→anima calibration.
//!
//! Ranges and weights loaded from `anima_config.yaml` at startup and
//! atomically rewritten by the adaptive learner. Weight invariant: all
//! weights ≥ 0 and each dimension's weights sum to 1 (± 0.01).

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AnimaError;

pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Component weights for warmth: cpu temperature, cpu load, ambient
/// temperature, neural beta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmthWeights {
    pub cpu_temp: f32,
    pub cpu_load: f32,
    pub ambient_temp: f32,
    pub neural_beta: f32,
}

impl Default for WarmthWeights {
    fn default() -> Self {
        Self {
            cpu_temp: 0.3,
            cpu_load: 0.25,
            ambient_temp: 0.25,
            neural_beta: 0.2,
        }
    }
}

impl WarmthWeights {
    pub fn as_array(&self) -> [f32; 4] {
        [self.cpu_temp, self.cpu_load, self.ambient_temp, self.neural_beta]
    }
}

/// Component weights for clarity: log-mapped world light, sensor coverage,
/// neural alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarityWeights {
    pub light: f32,
    pub coverage: f32,
    pub neural_alpha: f32,
}

impl Default for ClarityWeights {
    fn default() -> Self {
        Self {
            light: 0.4,
            coverage: 0.3,
            neural_alpha: 0.3,
        }
    }
}

impl ClarityWeights {
    pub fn as_array(&self) -> [f32; 3] {
        [self.light, self.coverage, self.neural_alpha]
    }
}

/// Component weights for stability: deviations from humidity, pressure and
/// temperature ideals (inverted), neural delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityWeights {
    pub humidity_dev: f32,
    pub pressure_dev: f32,
    pub temp_dev: f32,
    pub neural_delta: f32,
}

impl Default for StabilityWeights {
    fn default() -> Self {
        Self {
            humidity_dev: 0.25,
            pressure_dev: 0.25,
            temp_dev: 0.2,
            neural_delta: 0.3,
        }
    }
}

impl StabilityWeights {
    pub fn as_array(&self) -> [f32; 4] {
        [self.humidity_dev, self.pressure_dev, self.temp_dev, self.neural_delta]
    }
}

/// Component weights for presence: resource headroom, interaction trend,
/// neural gamma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceWeights {
    pub headroom: f32,
    pub interaction: f32,
    pub neural_gamma: f32,
}

impl Default for PresenceWeights {
    fn default() -> Self {
        Self {
            headroom: 0.4,
            interaction: 0.3,
            neural_gamma: 0.3,
        }
    }
}

impl PresenceWeights {
    pub fn as_array(&self) -> [f32; 3] {
        [self.headroom, self.interaction, self.neural_gamma]
    }
}

/// All per-dimension component weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimaWeights {
    pub warmth: WarmthWeights,
    pub clarity: ClarityWeights,
    pub stability: StabilityWeights,
    pub presence: PresenceWeights,
}

/// Sensor ranges and ideals plus the weight matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub cpu_temp_min: f32,
    pub cpu_temp_max: f32,
    pub ambient_temp_min: f32,
    pub ambient_temp_max: f32,
    pub pressure_ideal_hpa: f32,
    pub humidity_ideal_pct: f32,
    /// Reference lux for the Weber-Fechner log mapping: world light at this
    /// level maps to clarity contribution 1.0.
    pub light_ref_lux: f32,
    pub weights: AnimaWeights,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            cpu_temp_min: 35.0,
            cpu_temp_max: 75.0,
            ambient_temp_min: 15.0,
            ambient_temp_max: 28.0,
            pressure_ideal_hpa: 1013.0,
            humidity_ideal_pct: 45.0,
            light_ref_lux: 400.0,
            weights: AnimaWeights::default(),
        }
    }
}

impl Calibration {
    /// Reject calibrations that would break the sensing pipeline.
    pub fn validate(&self) -> Result<(), AnimaError> {
        let ranges: [(&str, f32, f32); 2] = [
            ("cpu_temp", self.cpu_temp_min, self.cpu_temp_max),
            ("ambient_temp", self.ambient_temp_min, self.ambient_temp_max),
        ];
        for (name, min, max) in ranges {
            if !min.is_finite() || !max.is_finite() || min >= max {
                return Err(AnimaError::CalibrationInvalid(format!(
                    "{name} range invalid: [{min}, {max}]"
                )));
            }
        }
        if !(850.0..=1100.0).contains(&self.pressure_ideal_hpa) {
            return Err(AnimaError::CalibrationInvalid(format!(
                "pressure_ideal_hpa out of range: {}",
                self.pressure_ideal_hpa
            )));
        }
        if !(0.0..=100.0).contains(&self.humidity_ideal_pct) {
            return Err(AnimaError::CalibrationInvalid(format!(
                "humidity_ideal_pct out of range: {}",
                self.humidity_ideal_pct
            )));
        }
        if !self.light_ref_lux.is_finite() || self.light_ref_lux <= 0.0 {
            return Err(AnimaError::CalibrationInvalid(format!(
                "light_ref_lux must be positive: {}",
                self.light_ref_lux
            )));
        }
        Self::check_weights("warmth", &self.weights.warmth.as_array())?;
        Self::check_weights("clarity", &self.weights.clarity.as_array())?;
        Self::check_weights("stability", &self.weights.stability.as_array())?;
        Self::check_weights("presence", &self.weights.presence.as_array())?;
        Ok(())
    }

    fn check_weights(dim: &str, weights: &[f32]) -> Result<(), AnimaError> {
        let mut sum = 0.0;
        for &w in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(AnimaError::CalibrationInvalid(format!(
                    "{dim} weight negative or non-finite: {w}"
                )));
            }
            sum += w;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnimaError::CalibrationInvalid(format!(
                "{dim} weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }

    /// Apply a partial update, validating the result. On failure the
    /// calibration is unchanged.
    pub fn apply_patch(&self, patch: &CalibrationPatch) -> Result<Calibration, AnimaError> {
        let mut next = self.clone();
        if let Some(v) = patch.cpu_temp_min {
            next.cpu_temp_min = v;
        }
        if let Some(v) = patch.cpu_temp_max {
            next.cpu_temp_max = v;
        }
        if let Some(v) = patch.ambient_temp_min {
            next.ambient_temp_min = v;
        }
        if let Some(v) = patch.ambient_temp_max {
            next.ambient_temp_max = v;
        }
        if let Some(v) = patch.pressure_ideal_hpa {
            next.pressure_ideal_hpa = v;
        }
        if let Some(v) = patch.humidity_ideal_pct {
            next.humidity_ideal_pct = v;
        }
        if let Some(v) = patch.light_ref_lux {
            next.light_ref_lux = v;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial calibration for the `set_calibration` tool. Weights are not
/// externally settable; the learner owns them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationPatch {
    pub cpu_temp_min: Option<f32>,
    pub cpu_temp_max: Option<f32>,
    pub ambient_temp_min: Option<f32>,
    pub ambient_temp_max: Option<f32>,
    pub pressure_ideal_hpa: Option<f32>,
    pub humidity_ideal_pct: Option<f32>,
    pub light_ref_lux: Option<f32>,
}

/// Lock-free calibration handle. The broker tick loads without blocking;
/// the learner swaps in a replacement atomically.
pub struct CalibrationHandle {
    inner: ArcSwap<Calibration>,
}

impl CalibrationHandle {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            inner: ArcSwap::from_pointee(calibration),
        }
    }

    pub fn load(&self) -> Arc<Calibration> {
        self.inner.load_full()
    }

    pub fn store(&self, calibration: Calibration) {
        self.inner.store(Arc::new(calibration));
    }
}

impl Default for CalibrationHandle {
    fn default() -> Self {
        Self::new(Calibration::default())
    }
}
