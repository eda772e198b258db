//! World-light estimation: LED self-glow correction + smoothing.
//!
//! The light sensor sits close enough to the LEDs that their glow pollutes
//! the ambient reading. The driver's known manual brightness gives a stable
//! glow estimate: `glow = brightness * lux_per_brightness + floor`, and
//! `world = max(0, raw - glow)`, smoothed over a 4-sample window.
//!
//! Every consumer uses world light except the proprioceptive predictor,
//! which deliberately models the raw reading.

use std::collections::VecDeque;

pub const SMOOTHING_WINDOW: usize = 4;

#[derive(Debug)]
pub struct WorldLight {
    lux_per_brightness: f32,
    glow_floor_lux: f32,
    window: VecDeque<f32>,
}

impl WorldLight {
    pub fn new(lux_per_brightness: f32, glow_floor_lux: f32) -> Self {
        Self {
            lux_per_brightness,
            glow_floor_lux,
            window: VecDeque::with_capacity(SMOOTHING_WINDOW),
        }
    }

    /// Estimated lux contributed by the LEDs at the given brightness.
    pub fn glow_estimate(&self, led_brightness: f32) -> f32 {
        led_brightness * self.lux_per_brightness + self.glow_floor_lux
    }

    /// Correct a raw lux reading and push it through the smoother.
    /// Returns the smoothed world light.
    pub fn update(&mut self, raw_lux: f32, led_brightness: f32) -> f32 {
        let corrected = (raw_lux - self.glow_estimate(led_brightness)).max(0.0);
        if self.window.len() == SMOOTHING_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(corrected);
        self.current()
    }

    /// Mean of the smoothing window; 0 before any sample.
    pub fn current(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }
}
