//! Temporal-difference action selection.
//!
//! A small discrete action set with learned action-values. Selection
//! discounts each value by `0.9^conflict_rate` so actions that keep
//! tearing the anima apart lose their appeal even when their raw value
//! stays high. Ties break lexicographically on the action id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TD_LEARNING_RATE: f32 = 0.1;
pub const TD_DISCOUNT: f32 = 0.9;
pub const CONFLICT_DISCOUNT_BASE: f32 = 0.9;
const INITIAL_VALUE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    FocusAttention,
    Explore,
    LedBrightness,
    Rest,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::FocusAttention,
        Action::Explore,
        Action::LedBrightness,
        Action::Rest,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Action::FocusAttention => "focus_attention",
            Action::Explore => "explore",
            Action::LedBrightness => "led_brightness",
            Action::Rest => "rest",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    values: HashMap<Action, f32>,
    uses: HashMap<Action, u32>,
    last_action: Option<Action>,
}

impl Agency {
    pub fn new() -> Self {
        let values = Action::ALL.iter().map(|a| (*a, INITIAL_VALUE)).collect();
        Self {
            values,
            uses: HashMap::new(),
            last_action: None,
        }
    }

    pub fn value(&self, action: Action) -> f32 {
        self.values.get(&action).copied().unwrap_or(INITIAL_VALUE)
    }

    pub fn uses(&self, action: Action) -> u32 {
        self.uses.get(&action).copied().unwrap_or(0)
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    /// TD update for the last selected action against the observed
    /// satisfaction signal.
    pub fn reinforce(&mut self, satisfaction: f32) {
        let Some(action) = self.last_action else {
            return;
        };
        let satisfaction = satisfaction.clamp(0.0, 1.0);
        let best_next = self
            .values
            .values()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let v = self.value(action);
        let target = satisfaction + TD_DISCOUNT * best_next;
        // Normalize the bootstrapped target back into [0, 1] so values
        // stay comparable to the satisfaction scale.
        let target = target / (1.0 + TD_DISCOUNT);
        let updated = v + TD_LEARNING_RATE * (target - v);
        self.values.insert(action, updated.clamp(0.0, 1.0));
    }

    /// Discounted value used at selection time.
    pub fn discounted_value(&self, action: Action, conflict_rate: f32) -> f32 {
        self.value(action) * CONFLICT_DISCOUNT_BASE.powf(conflict_rate.max(0.0))
    }

    /// Pick the best action under conflict discounting. Ties break on the
    /// lexicographic order of action ids so selection is deterministic.
    pub fn select_action(&mut self, conflict_rates: &HashMap<Action, f32>) -> Action {
        let mut best = Action::ALL[0];
        let mut best_score = f32::NEG_INFINITY;
        let mut candidates: Vec<Action> = Action::ALL.to_vec();
        candidates.sort_by_key(|a| a.id());

        for action in candidates {
            let rate = conflict_rates.get(&action).copied().unwrap_or(0.0);
            let score = self.discounted_value(action, rate);
            if score > best_score {
                best_score = score;
                best = action;
            }
        }

        *self.uses.entry(best).or_insert(0) += 1;
        self.last_action = Some(best);
        best
    }

    /// Snapshot for the shared-memory learning block.
    pub fn snapshot(&self) -> serde_json::Value {
        let values: serde_json::Map<String, serde_json::Value> = Action::ALL
            .iter()
            .map(|a| {
                (
                    a.id().to_string(),
                    serde_json::json!({
                        "value": self.value(*a),
                        "uses": self.uses(*a),
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "values": values,
            "last_action": self.last_action.map(|a| a.id()),
        })
    }
}

impl Default for Agency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_selection_lexicographic() {
        let mut agency = Agency::new();
        // All values equal → first id in lexicographic order wins.
        let action = agency.select_action(&HashMap::new());
        assert_eq!(action, Action::Explore); // "explore" < "focus_attention" < ...
    }

    #[test]
    fn test_reinforce_raises_value() {
        let mut agency = Agency::new();
        agency.select_action(&HashMap::new());
        let before = agency.value(Action::Explore);
        agency.reinforce(1.0);
        assert!(agency.value(Action::Explore) > before);
    }

    #[test]
    fn test_low_satisfaction_lowers_value() {
        let mut agency = Agency::new();
        agency.select_action(&HashMap::new());
        let before = agency.value(Action::Explore);
        agency.reinforce(0.0);
        assert!(agency.value(Action::Explore) < before);
    }

    #[test]
    fn test_conflict_discount_formula() {
        // conflict_rate 0.3 → value × 0.9^0.3 ≈ 0.969 × value
        let agency = Agency::new();
        let discounted = agency.discounted_value(Action::LedBrightness, 0.3);
        let expected = 0.5 * 0.9f32.powf(0.3);
        assert!((discounted - expected).abs() < 1e-6);
        assert!((discounted / 0.5 - 0.9689).abs() < 1e-3);
    }

    #[test]
    fn test_conflicted_action_loses_selection() {
        let mut agency = Agency::new();
        // Push explore's value up, then hit it with a huge conflict rate.
        for _ in 0..20 {
            agency.select_action(&HashMap::new());
            agency.reinforce(1.0);
        }
        let mut conflicts = HashMap::new();
        conflicts.insert(Action::Explore, 10.0);
        let action = agency.select_action(&conflicts);
        assert_ne!(action, Action::Explore);
    }

    #[test]
    fn test_uses_counted() {
        let mut agency = Agency::new();
        for _ in 0..3 {
            agency.select_action(&HashMap::new());
        }
        let total: u32 = Action::ALL.iter().map(|a| agency.uses(*a)).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_values_stay_bounded() {
        let mut agency = Agency::new();
        for _ in 0..1000 {
            agency.select_action(&HashMap::new());
            agency.reinforce(1.0);
        }
        for a in Action::ALL {
            let v = agency.value(a);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
