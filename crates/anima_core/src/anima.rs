//! The proprioceptive self-state.
//!
//! Four scalar dimensions, each in [0, 1]:
//! - **warmth**: thermal/computational heat
//! - **clarity**: light and sensory coverage
//! - **stability**: closeness to environmental ideals
//! - **presence**: headroom and interaction
//!
//! Values are clamped on every mutation path. NaN/Inf never survive the
//! deserialization boundary.

use serde::{Deserialize, Deserializer, Serialize};

/// Guard against NaN and Infinity in state values.
/// If the value is NaN or Inf, replace with the provided fallback.
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in anima state, resetting to {}", fallback);
        fallback
    }
}

/// Serde deserializer that sanitizes NaN/Inf → 0.5 at the deserialization boundary.
pub fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f32::deserialize(deserializer)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Ok(0.5)
    }
}

/// One of the four anima dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Warmth,
    Clarity,
    Stability,
    Presence,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Warmth,
        Dimension::Clarity,
        Dimension::Stability,
        Dimension::Presence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Warmth => "warmth",
            Dimension::Clarity => "clarity",
            Dimension::Stability => "stability",
            Dimension::Presence => "presence",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "warmth" => Some(Dimension::Warmth),
            "clarity" => Some(Dimension::Clarity),
            "stability" => Some(Dimension::Stability),
            "presence" => Some(Dimension::Presence),
            _ => None,
        }
    }

    /// Stable index into `[f32; 4]` arrays.
    pub fn index(&self) -> usize {
        match self {
            Dimension::Warmth => 0,
            Dimension::Clarity => 1,
            Dimension::Stability => 2,
            Dimension::Presence => 3,
        }
    }
}

/// The four-scalar self-state. Every value is always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anima {
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub warmth: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub clarity: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub stability: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub presence: f32,
}

impl Default for Anima {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Anima {
    /// The homeostatic midpoint: all dimensions at 0.5.
    pub fn neutral() -> Self {
        Self {
            warmth: 0.5,
            clarity: 0.5,
            stability: 0.5,
            presence: 0.5,
        }
    }

    pub fn new(warmth: f32, clarity: f32, stability: f32, presence: f32) -> Self {
        let mut a = Self {
            warmth,
            clarity,
            stability,
            presence,
        };
        a.normalize();
        a
    }

    /// Clamp all dimensions to [0, 1] and sanitize NaN/Inf.
    pub fn normalize(&mut self) {
        self.warmth = sanitize_f32(self.warmth, 0.5).clamp(0.0, 1.0);
        self.clarity = sanitize_f32(self.clarity, 0.5).clamp(0.0, 1.0);
        self.stability = sanitize_f32(self.stability, 0.5).clamp(0.0, 1.0);
        self.presence = sanitize_f32(self.presence, 0.5).clamp(0.0, 1.0);
    }

    pub fn get(&self, dim: Dimension) -> f32 {
        match dim {
            Dimension::Warmth => self.warmth,
            Dimension::Clarity => self.clarity,
            Dimension::Stability => self.stability,
            Dimension::Presence => self.presence,
        }
    }

    pub fn set(&mut self, dim: Dimension, value: f32) {
        let v = sanitize_f32(value, 0.5).clamp(0.0, 1.0);
        match dim {
            Dimension::Warmth => self.warmth = v,
            Dimension::Clarity => self.clarity = v,
            Dimension::Stability => self.stability = v,
            Dimension::Presence => self.presence = v,
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.warmth, self.clarity, self.stability, self.presence]
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn mean(&self) -> f32 {
        (self.warmth + self.clarity + self.stability + self.presence) / 4.0
    }
}

/// Observable mood derived from the anima state.
///
/// Priority order matters: distress states (overheated, stressed) win over
/// contentment so the face never smiles through a thermal emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Content,
    Alert,
    Sleepy,
    Stressed,
    Overheated,
    Neutral,
}

impl Mood {
    pub fn from_anima(anima: &Anima) -> Self {
        if anima.warmth > 0.85 {
            Mood::Overheated
        } else if anima.stability < 0.3 {
            Mood::Stressed
        } else if anima.presence < 0.25 && anima.clarity < 0.4 {
            Mood::Sleepy
        } else if anima.clarity > 0.7 && anima.presence > 0.6 {
            Mood::Alert
        } else if anima.warmth > 0.45 && anima.stability > 0.6 && anima.clarity > 0.45 {
            Mood::Content
        } else {
            Mood::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Content => "content",
            Mood::Alert => "alert",
            Mood::Sleepy => "sleepy",
            Mood::Stressed => "stressed",
            Mood::Overheated => "overheated",
            Mood::Neutral => "neutral",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_default() {
        let a = Anima::default();
        assert_eq!(a.mean(), 0.5);
    }

    #[test]
    fn test_new_clamps() {
        let a = Anima::new(1.5, -0.2, f32::NAN, 0.7);
        assert_eq!(a.warmth, 1.0);
        assert_eq!(a.clarity, 0.0);
        assert_eq!(a.stability, 0.5);
        assert!((a.presence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut a = Anima::neutral();
        for dim in Dimension::ALL {
            a.set(dim, 0.8);
            assert!((a.get(dim) - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_sanitizes() {
        let mut a = Anima::neutral();
        a.set(Dimension::Warmth, f32::INFINITY);
        assert!((a.warmth - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_parse_roundtrip() {
        for dim in Dimension::ALL {
            assert_eq!(Dimension::parse_str(dim.as_str()), Some(dim));
        }
        assert_eq!(Dimension::parse_str("vibes"), None);
    }

    #[test]
    fn test_mood_overheated_wins() {
        let a = Anima::new(0.95, 0.9, 0.2, 0.9);
        assert_eq!(Mood::from_anima(&a), Mood::Overheated);
    }

    #[test]
    fn test_mood_stressed() {
        let a = Anima::new(0.5, 0.5, 0.1, 0.5);
        assert_eq!(Mood::from_anima(&a), Mood::Stressed);
    }

    #[test]
    fn test_mood_content() {
        let a = Anima::new(0.6, 0.6, 0.7, 0.5);
        assert_eq!(Mood::from_anima(&a), Mood::Content);
    }

    #[test]
    fn test_nan_never_survives_deserialization() {
        let json = r#"{"warmth": null, "clarity": 0.4, "stability": 0.6, "presence": 0.5}"#;
        // null is a parse error, but NaN literal is not representable in JSON;
        // verify the sanitizer path via an out-of-band constructed value instead.
        assert!(serde_json::from_str::<Anima>(json).is_err());
        let a = Anima::new(f32::NAN, 0.4, 0.6, 0.5);
        assert!((a.warmth - 0.5).abs() < 1e-6);
    }
}
