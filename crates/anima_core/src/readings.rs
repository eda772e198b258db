//! Typed per-tick sensor snapshot.
//!
//! Every field is optional: a sensor that fails to read leaves its field
//! `None` rather than poisoning the whole snapshot. `available()` reports
//! what was actually obtained so the sensing pipeline can apply its
//! confidence penalty.

use serde::{Deserialize, Serialize};

use crate::anima::deserialize_safe_f32;

/// Five computational "EEG" band powers, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuralBands {
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub delta: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub theta: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub alpha: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub beta: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub gamma: f32,
}

impl Default for NeuralBands {
    fn default() -> Self {
        Self {
            delta: 0.5,
            theta: 0.5,
            alpha: 0.5,
            beta: 0.5,
            gamma: 0.5,
        }
    }
}

impl NeuralBands {
    /// Clamp all band powers to [0, 1].
    pub fn normalize(&mut self) {
        self.delta = self.delta.clamp(0.0, 1.0);
        self.theta = self.theta.clamp(0.0, 1.0);
        self.alpha = self.alpha.clamp(0.0, 1.0);
        self.beta = self.beta.clamp(0.0, 1.0);
        self.gamma = self.gamma.clamp(0.0, 1.0);
    }

    /// Linear blend: `self * (1 - t) + other * t`.
    pub fn lerp(&self, other: &NeuralBands, t: f32) -> NeuralBands {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        NeuralBands {
            delta: mix(self.delta, other.delta),
            theta: mix(self.theta, other.theta),
            alpha: mix(self.alpha, other.alpha),
            beta: mix(self.beta, other.beta),
            gamma: mix(self.gamma, other.gamma),
        }
    }
}

/// Immutable snapshot of everything the creature sensed this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    /// SoC temperature (thermal zone), °C.
    pub cpu_temp_c: Option<f32>,
    /// Ambient temperature from the environmental sensor, °C.
    pub ambient_temp_c: Option<f32>,
    /// Relative humidity, %.
    pub humidity_pct: Option<f32>,
    /// Barometric pressure, hPa.
    pub pressure_hpa: Option<f32>,
    /// Raw lux straight from the light sensor (includes LED self-glow).
    pub light_lux: Option<f32>,
    /// Lux with estimated LED glow subtracted, smoothed over 4 samples.
    pub world_light_lux: Option<f32>,
    /// The LED driver's current manual brightness setting.
    pub led_brightness: Option<f32>,
    /// CPU utilisation, %.
    pub cpu_pct: Option<f32>,
    /// Memory utilisation, %.
    pub mem_pct: Option<f32>,
    /// IO-wait share, %.
    pub io_wait_pct: Option<f32>,
    /// CPU frequency as a fraction of maximum, [0, 1].
    pub cpu_freq_norm: Option<f32>,
    /// Derived band powers.
    pub bands: Option<NeuralBands>,
    /// Unix timestamp of the read.
    pub taken_at: i64,
}

impl SensorReadings {
    /// Names of the fields that were actually obtained this tick.
    pub fn available(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.cpu_temp_c.is_some() {
            fields.push("cpu_temp_c");
        }
        if self.ambient_temp_c.is_some() {
            fields.push("ambient_temp_c");
        }
        if self.humidity_pct.is_some() {
            fields.push("humidity_pct");
        }
        if self.pressure_hpa.is_some() {
            fields.push("pressure_hpa");
        }
        if self.light_lux.is_some() {
            fields.push("light_lux");
        }
        if self.world_light_lux.is_some() {
            fields.push("world_light_lux");
        }
        if self.led_brightness.is_some() {
            fields.push("led_brightness");
        }
        if self.cpu_pct.is_some() {
            fields.push("cpu_pct");
        }
        if self.mem_pct.is_some() {
            fields.push("mem_pct");
        }
        if self.io_wait_pct.is_some() {
            fields.push("io_wait_pct");
        }
        if self.cpu_freq_norm.is_some() {
            fields.push("cpu_freq_norm");
        }
        if self.bands.is_some() {
            fields.push("bands");
        }
        fields
    }

    /// Fraction of environmental sensor fields present, used as the
    /// clarity coverage signal. System metrics are near-always available
    /// so they are excluded from coverage.
    pub fn coverage(&self) -> f32 {
        let probes = [
            self.cpu_temp_c,
            self.ambient_temp_c,
            self.humidity_pct,
            self.pressure_hpa,
            self.light_lux,
        ];
        let present = probes.iter().filter(|p| p.is_some()).count();
        present as f32 / probes.len() as f32
    }
}
