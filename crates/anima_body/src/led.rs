//! The LED lighthouse: three DotStars on a warm-only palette.
//!
//! Rules that hold in normal operation:
//! - every emitted color satisfies R ≥ G ≥ B (warm palette);
//! - deep red (180, 30, 0) is reserved for genuine hardware distress;
//! - brightness is manual only: default 0.04, hard ceiling 0.12;
//! - all color changes ramp over at least 2 s;
//! - breathing is a 12 s sine with amplitude `min(0.005, brightness·0.08)`.
//!
//! The driver owns `known_brightness`; the proprioceptive predictor reads
//! it through the getter so glow estimation uses the stable manual value,
//! never a fluctuating guess.

use serde::{Deserialize, Serialize};

use anima_core::Mood;

pub const LED_COUNT: usize = 3;
pub const DEFAULT_BRIGHTNESS: f32 = 0.04;
pub const MAX_BRIGHTNESS: f32 = 0.12;
pub const BREATH_PERIOD_SECONDS: f32 = 12.0;
pub const MIN_RAMP_SECONDS: f32 = 2.0;
/// Default ramp: comfortably above the minimum.
pub const RAMP_SECONDS: f32 = 2.5;
pub const DISTRESS_COLOR: Color = Color {
    r: 180,
    g: 30,
    b: 0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Construct, clamped onto the warm palette (R ≥ G ≥ B).
    pub fn warm(r: u8, g: u8, b: u8) -> Self {
        let g = g.min(r);
        let b = b.min(g);
        Self { r, g, b }
    }

    pub fn is_warm(&self) -> bool {
        self.r >= self.g && self.g >= self.b
    }

    fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

/// Mood → resting palette color.
pub fn mood_color(mood: Mood) -> Color {
    match mood {
        Mood::Content => Color::warm(255, 140, 40),
        Mood::Alert => Color::warm(255, 190, 90),
        Mood::Sleepy => Color::warm(140, 60, 15),
        Mood::Stressed => Color::warm(220, 90, 20),
        Mood::Overheated => Color::warm(230, 60, 10),
        Mood::Neutral => Color::warm(240, 120, 35),
    }
}

/// Slow autonomous patterns across the three LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dance {
    Steady,
    /// Brightness phase offset rolls across the strip.
    Sweep,
    /// All three pulse together, slightly deeper than the breath.
    Pulse,
}

/// One rendered frame: per-LED colors and the global brightness actually
/// sent to the strip this instant.
#[derive(Debug, Clone, PartialEq)]
pub struct LedFrame {
    pub colors: [Color; LED_COUNT],
    pub brightness: f32,
}

#[derive(Debug)]
struct Ramp {
    from: [Color; LED_COUNT],
    to: [Color; LED_COUNT],
    elapsed: f32,
    duration: f32,
}

#[derive(Debug)]
pub struct Lighthouse {
    brightness: f32,
    max_brightness: f32,
    current: [Color; LED_COUNT],
    ramp: Option<Ramp>,
    dance: Dance,
    breath_clock: f32,
    distress: bool,
}

impl Lighthouse {
    pub fn new(default_brightness: f32, max_brightness: f32) -> Self {
        let max = max_brightness.clamp(0.0, MAX_BRIGHTNESS);
        Self {
            brightness: default_brightness.clamp(0.0, max),
            max_brightness: max,
            current: [mood_color(Mood::Neutral); LED_COUNT],
            ramp: None,
            dance: Dance::Steady,
            breath_clock: 0.0,
            distress: false,
        }
    }

    /// The stable manual brightness the proprioceptive model reads.
    pub fn known_brightness(&self) -> f32 {
        self.brightness
    }

    /// Manual brightness control, the only way brightness changes.
    pub fn set_brightness(&mut self, value: f32) {
        self.brightness = value.clamp(0.0, self.max_brightness);
    }

    pub fn set_dance(&mut self, dance: Dance) {
        self.dance = dance;
    }

    pub fn dance(&self) -> Dance {
        self.dance
    }

    /// Begin ramping all LEDs toward a color. Durations shorter than the
    /// 2 s minimum are stretched to it.
    pub fn ramp_to(&mut self, target: Color, duration_s: f32) {
        let target = Color::warm(target.r, target.g, target.b);
        self.ramp = Some(Ramp {
            from: self.current,
            to: [target; LED_COUNT],
            elapsed: 0.0,
            duration: duration_s.max(MIN_RAMP_SECONDS),
        });
    }

    /// Enter or leave hardware distress. Distress is steady deep red and
    /// bypasses dances (but still ramps in).
    pub fn set_distress(&mut self, distress: bool) {
        if distress == self.distress {
            return;
        }
        self.distress = distress;
        if distress {
            self.ramp_to(DISTRESS_COLOR, MIN_RAMP_SECONDS);
            tracing::warn!("Lighthouse entering distress red");
        }
    }

    pub fn in_distress(&self) -> bool {
        self.distress
    }

    /// Breathing amplitude at the current brightness.
    fn breath_amplitude(&self) -> f32 {
        (self.brightness * 0.08).min(0.005)
    }

    /// Advance time and render one frame. `activity_multiplier` scales the
    /// emitted brightness (the activity machine's dimming), never the
    /// stored manual setting.
    pub fn tick(&mut self, dt_s: f32, activity_multiplier: f32) -> LedFrame {
        self.breath_clock = (self.breath_clock + dt_s) % BREATH_PERIOD_SECONDS;

        // Advance any color ramp.
        if let Some(ramp) = &mut self.ramp {
            ramp.elapsed += dt_s;
            let t = (ramp.elapsed / ramp.duration).min(1.0);
            for i in 0..LED_COUNT {
                self.current[i] = ramp.from[i].lerp(&ramp.to[i], t);
            }
            if t >= 1.0 {
                self.ramp = None;
            }
        }

        let phase = self.breath_clock / BREATH_PERIOD_SECONDS * std::f32::consts::TAU;
        let breath = phase.sin() * self.breath_amplitude();

        let base = (self.brightness * activity_multiplier.clamp(0.0, 1.0) + breath)
            .clamp(0.0, self.max_brightness);

        let mut colors = self.current;
        if !self.distress {
            match self.dance {
                Dance::Steady => {}
                Dance::Sweep => {
                    // Roll a gentle dimming wave across the strip.
                    for (i, c) in colors.iter_mut().enumerate() {
                        let offset = phase + i as f32 * (std::f32::consts::TAU / LED_COUNT as f32);
                        let dim = 0.85 + 0.15 * offset.sin().max(0.0);
                        *c = Color::warm(
                            (c.r as f32 * dim) as u8,
                            (c.g as f32 * dim) as u8,
                            (c.b as f32 * dim) as u8,
                        );
                    }
                }
                Dance::Pulse => {
                    let dim = 0.8 + 0.2 * phase.sin().abs();
                    for c in colors.iter_mut() {
                        *c = Color::warm(
                            (c.r as f32 * dim) as u8,
                            (c.g as f32 * dim) as u8,
                            (c.b as f32 * dim) as u8,
                        );
                    }
                }
            }
        }

        LedFrame {
            colors,
            brightness: base,
        }
    }
}

impl Default for Lighthouse {
    fn default() -> Self {
        Self::new(DEFAULT_BRIGHTNESS, MAX_BRIGHTNESS)
    }
}
