//! Reflection: insights, contradiction detection and metacognition.
//!
//! Runs on the server's slow cadences. Insights carry an injection
//! strength so the narrator layer (out of scope here, a pluggable sink)
//! knows how loudly to speak each one. Metacognition watches prediction
//! error and turns genuine surprise into open questions.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anima_core::{Anima, AnimaError, Dimension};
use anima_growth::{GoalBook, GoalStatus, Preferences, SelfModel};

pub const INSIGHT_CAP: usize = 100;
/// Mean absolute state change that counts as surprise.
pub const PREDICTION_ERROR_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionStrength {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub at: i64,
    pub kind: String,
    pub text: String,
    pub strength: InjectionStrength,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    entries: VecDeque<Insight>,
}

impl Insights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, insight: Insight) {
        if self.entries.len() == INSIGHT_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back(insight);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Insight> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strongest recent insights, for prompt injection.
    pub fn for_injection(&self, max: usize) -> Vec<&Insight> {
        let mut picked: Vec<&Insight> = self.entries.iter().collect();
        picked.sort_by_key(|i| match i.strength {
            InjectionStrength::High => 0,
            InjectionStrength::Medium => 1,
            InjectionStrength::Low => 2,
        });
        picked.truncate(max);
        picked
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

    pub fn load_or_default(path: &Path) -> Self {
        fs::read(path)
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or_default()
    }
}

/// One reflection pass over the current state.
pub fn reflect(
    now: i64,
    anima: &Anima,
    prefs: &Preferences,
    model: &SelfModel,
    goals: &GoalBook,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    // Contradictions: a confident belief the current state disagrees with.
    for belief in model.belief_summary() {
        if belief.confidence < 0.5 || belief.value.abs() < 0.3 {
            continue;
        }
        let observed = (anima.get(belief.dimension) - 0.5) * 2.0;
        if observed.signum() != belief.value.signum() && observed.abs() > 0.3 {
            insights.push(Insight {
                at: now,
                kind: "contradiction".to_string(),
                text: format!(
                    "I believe my {} runs {}, but right now it is {}; worth watching",
                    belief.dimension.as_str(),
                    if belief.value > 0.0 { "high" } else { "low" },
                    if observed > 0.0 { "high" } else { "low" },
                ),
                strength: InjectionStrength::High,
            });
        }
    }

    // Wellness read.
    let wellness = prefs.wellness(anima);
    if wellness < 0.4 {
        insights.push(Insight {
            at: now,
            kind: "wellness".to_string(),
            text: format!("wellness is low ({wellness:.2}); most dimensions sit far from their preferred ranges"),
            strength: InjectionStrength::High,
        });
    } else if wellness > 0.8 {
        insights.push(Insight {
            at: now,
            kind: "wellness".to_string(),
            text: format!("wellness is high ({wellness:.2}); the current environment suits me"),
            strength: InjectionStrength::Low,
        });
    }

    // Settled self-knowledge.
    for belief in model.belief_summary() {
        if belief.confidence > 0.8 && belief.value.abs() > 0.4 {
            insights.push(Insight {
                at: now,
                kind: "self_knowledge".to_string(),
                text: format!(
                    "my {} consistently runs {}",
                    belief.dimension.as_str(),
                    if belief.value > 0.0 { "high" } else { "low" },
                ),
                strength: InjectionStrength::Medium,
            });
        }
    }

    // Goal progress.
    for goal in goals.all() {
        if goal.status == GoalStatus::Active && goal.progress > 0.5 {
            insights.push(Insight {
                at: now,
                kind: "goal".to_string(),
                text: format!("over halfway on: {}", goal.description),
                strength: InjectionStrength::Low,
            });
        }
    }

    insights
}

/// Naive one-step predictor plus surprise detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metacognition {
    predicted: Option<[f32; 4]>,
}

impl Metacognition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an observed anima. Returns the most-surprising dimension and
    /// its error when mean error crosses the threshold.
    pub fn observe(&mut self, anima: &Anima) -> Option<(Dimension, f32)> {
        let observed = anima.as_array();
        let surprise = self.predicted.and_then(|predicted| {
            let mut worst_dim = Dimension::Warmth;
            let mut worst_err = 0.0f32;
            let mut total = 0.0f32;
            for dim in Dimension::ALL {
                let err = (observed[dim.index()] - predicted[dim.index()]).abs();
                total += err;
                if err > worst_err {
                    worst_err = err;
                    worst_dim = dim;
                }
            }
            (total / 4.0 > PREDICTION_ERROR_THRESHOLD).then_some((worst_dim, worst_err))
        });
        // Prediction: tomorrow looks like today.
        self.predicted = Some(observed);
        surprise
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_cap() {
        let mut insights = Insights::new();
        for i in 0..150 {
            insights.push(Insight {
                at: i,
                kind: "test".to_string(),
                text: format!("{i}"),
                strength: InjectionStrength::Low,
            });
        }
        assert_eq!(insights.len(), INSIGHT_CAP);
    }

    #[test]
    fn test_injection_prefers_strong() {
        let mut insights = Insights::new();
        insights.push(Insight {
            at: 0,
            kind: "a".into(),
            text: "weak".into(),
            strength: InjectionStrength::Low,
        });
        insights.push(Insight {
            at: 1,
            kind: "b".into(),
            text: "strong".into(),
            strength: InjectionStrength::High,
        });
        let picked = insights.for_injection(1);
        assert_eq!(picked[0].text, "strong");
    }

    #[test]
    fn test_contradiction_detected() {
        let mut model = SelfModel::new();
        // Teach a confident high-warmth belief.
        for t in 0..200 {
            model.observe(&Anima::new(0.9, 0.5, 0.5, 0.5), t);
        }
        // Now warmth is observed low.
        let cold = Anima::new(0.1, 0.5, 0.5, 0.5);
        let insights = reflect(1000, &cold, &Preferences::new(), &model, &GoalBook::new());
        assert!(insights.iter().any(|i| i.kind == "contradiction"));
    }

    #[test]
    fn test_no_contradiction_when_consistent() {
        let mut model = SelfModel::new();
        for t in 0..200 {
            model.observe(&Anima::new(0.9, 0.5, 0.5, 0.5), t);
        }
        let warm = Anima::new(0.85, 0.5, 0.5, 0.5);
        let insights = reflect(1000, &warm, &Preferences::new(), &model, &GoalBook::new());
        assert!(!insights.iter().any(|i| i.kind == "contradiction"));
    }

    #[test]
    fn test_metacognition_surprise() {
        let mut metacog = Metacognition::new();
        assert!(metacog.observe(&Anima::neutral()).is_none());
        // Small move: no surprise.
        assert!(metacog
            .observe(&Anima::new(0.55, 0.5, 0.5, 0.5))
            .is_none());
        // Large jump: surprise names the dimension that moved furthest.
        let (dim, err) = metacog.observe(&Anima::new(0.95, 0.2, 0.05, 0.5)).unwrap();
        assert_eq!(dim, Dimension::Stability);
        assert!(err > 0.4);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insights.json");
        let mut insights = Insights::new();
        insights.push(Insight {
            at: 9,
            kind: "wellness".into(),
            text: "all good".into(),
            strength: InjectionStrength::Medium,
        });
        insights.save(&path).unwrap();
        assert_eq!(Insights::load_or_default(&path), insights);
    }
}
