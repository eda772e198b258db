//! Face rendering and screen navigation for the small TFT.
//!
//! The face derives its mood from anima; micro-expressions follow fixed
//! cadence rules (blink period by mood, eye openness by activity, tint
//! transitions capped to 20% per frame). The navigator cycles screens on
//! edge-triggered joystick input and auto-returns to the face after 10 s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use anima_core::{ActivityState, Anima, Mood};

pub const AUTO_RETURN_SECONDS: i64 = 10;
/// Per-frame cap on tint movement, fraction of full scale.
pub const TINT_MAX_STEP: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Face,
    Status,
    Sensors,
    Neural,
    Notepad,
    Visitors,
    Qa,
    Growth,
    Health,
    Architecture,
}

impl Screen {
    pub const ALL: [Screen; 10] = [
        Screen::Face,
        Screen::Status,
        Screen::Sensors,
        Screen::Neural,
        Screen::Notepad,
        Screen::Visitors,
        Screen::Qa,
        Screen::Growth,
        Screen::Health,
        Screen::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Face => "face",
            Screen::Status => "status",
            Screen::Sensors => "sensors",
            Screen::Neural => "neural",
            Screen::Notepad => "notepad",
            Screen::Visitors => "visitors",
            Screen::Qa => "qa",
            Screen::Growth => "growth",
            Screen::Health => "health",
            Screen::Architecture => "architecture",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Screen::ALL.into_iter().find(|screen| screen.as_str() == s)
    }

    fn index(&self) -> usize {
        Screen::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Screen {
        Screen::ALL[(self.index() + 1) % Screen::ALL.len()]
    }

    pub fn prev(&self) -> Screen {
        Screen::ALL[(self.index() + Screen::ALL.len() - 1) % Screen::ALL.len()]
    }
}

/// Raw joystick/button sample for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoystickSample {
    pub left: bool,
    pub right: bool,
    pub select: bool,
    pub home: bool,
}

/// Edge-triggered screen navigation with auto-return.
#[derive(Debug)]
pub struct Navigator {
    current: Screen,
    prev_sample: JoystickSample,
    last_nav_at: DateTime<Utc>,
}

impl Navigator {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current: Screen::Face,
            prev_sample: JoystickSample::default(),
            last_nav_at: now,
        }
    }

    pub fn current(&self) -> Screen {
        self.current
    }

    /// Programmatic switch (tool surface).
    pub fn switch_to(&mut self, screen: Screen, now: DateTime<Utc>) {
        self.current = screen;
        self.last_nav_at = now;
    }

    /// Feed one input sample. Returns true if the user interacted (for the
    /// activity manager).
    pub fn update(&mut self, sample: JoystickSample, now: DateTime<Utc>) -> bool {
        let rising = |prev: bool, cur: bool| cur && !prev;
        let mut interacted = false;

        if rising(self.prev_sample.right, sample.right) {
            self.current = self.current.next();
            interacted = true;
        }
        if rising(self.prev_sample.left, sample.left) {
            self.current = self.current.prev();
            interacted = true;
        }
        if rising(self.prev_sample.select, sample.select) {
            self.current = self.current.next();
            interacted = true;
        }
        if rising(self.prev_sample.home, sample.home) {
            self.current = Screen::Face;
            interacted = true;
        }
        self.prev_sample = sample;

        if interacted {
            self.last_nav_at = now;
        } else if self.current != Screen::Face
            && (now - self.last_nav_at).num_seconds() >= AUTO_RETURN_SECONDS
        {
            self.current = Screen::Face;
        }
        interacted
    }
}

/// Rendered face parameters for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceState {
    pub mood: Mood,
    /// Seconds between blinks.
    pub blink_period_s: f32,
    /// 0 = closed, 1 = wide open.
    pub eye_openness: f32,
    /// Normalized warm tint, each channel in [0, 1].
    pub tint: [f32; 3],
}

/// Holds tint continuity between frames.
#[derive(Debug)]
pub struct FaceRenderer {
    tint: [f32; 3],
}

fn mood_blink_period(mood: Mood) -> f32 {
    match mood {
        // Stressed: rapid 1–2 s blinking.
        Mood::Stressed | Mood::Overheated => 1.5,
        // Content: slow 4–6 s.
        Mood::Content => 5.0,
        // Sleepy blinks long and slow.
        Mood::Sleepy => 6.0,
        // Normal cadence 3–5 s.
        Mood::Alert | Mood::Neutral => 4.0,
    }
}

fn mood_tint(mood: Mood) -> [f32; 3] {
    match mood {
        Mood::Content => [1.0, 0.6, 0.2],
        Mood::Alert => [1.0, 0.8, 0.4],
        Mood::Sleepy => [0.5, 0.25, 0.1],
        Mood::Stressed => [0.9, 0.35, 0.1],
        Mood::Overheated => [0.95, 0.2, 0.05],
        Mood::Neutral => [0.9, 0.5, 0.2],
    }
}

impl FaceRenderer {
    pub fn new() -> Self {
        Self {
            tint: mood_tint(Mood::Neutral),
        }
    }

    /// Render one frame of face state from anima and activity.
    pub fn render(&mut self, anima: &Anima, activity: &ActivityState) -> FaceState {
        let mood = Mood::from_anima(anima);

        // Tint moves toward the mood target, capped per frame.
        let target = mood_tint(mood);
        for i in 0..3 {
            let delta = (target[i] - self.tint[i]).clamp(-TINT_MAX_STEP, TINT_MAX_STEP);
            self.tint[i] = (self.tint[i] + delta).clamp(0.0, 1.0);
        }

        // Eyes open with activity; never fully shut while awake.
        let eye_openness = (0.3 + 0.7 * activity.multiplier).clamp(0.0, 1.0);

        FaceState {
            mood,
            blink_period_s: mood_blink_period(mood),
            eye_openness,
            tint: self.tint,
        }
    }
}

impl Default for FaceRenderer {
    fn default() -> Self {
        Self::new()
    }
}
