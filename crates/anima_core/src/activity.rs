//! Activity level shared between broker outputs and the snapshot.

use serde::{Deserialize, Serialize};

/// Wakefulness tier. Each tier maps to a scalar multiplier consumed by the
/// face, LEDs and drawing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Active,
    Drowsy,
    Resting,
}

impl ActivityLevel {
    pub fn multiplier(&self) -> f32 {
        match self {
            ActivityLevel::Active => 1.0,
            ActivityLevel::Drowsy => 0.6,
            ActivityLevel::Resting => 0.35,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Active => "active",
            ActivityLevel::Drowsy => "drowsy",
            ActivityLevel::Resting => "resting",
        }
    }
}

/// Current activity decision plus the reason it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub level: ActivityLevel,
    pub reason: String,
    pub multiplier: f32,
}

impl ActivityState {
    pub fn new(level: ActivityLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
            multiplier: level.multiplier(),
        }
    }
}

impl Default for ActivityState {
    fn default() -> Self {
        Self::new(ActivityLevel::Active, "startup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipliers() {
        assert_eq!(ActivityLevel::Active.multiplier(), 1.0);
        assert_eq!(ActivityLevel::Drowsy.multiplier(), 0.6);
        assert_eq!(ActivityLevel::Resting.multiplier(), 0.35);
    }

    #[test]
    fn test_state_carries_multiplier() {
        let s = ActivityState::new(ActivityLevel::Drowsy, "idle 40m");
        assert_eq!(s.multiplier, 0.6);
        assert_eq!(s.level.as_str(), "drowsy");
    }
}
