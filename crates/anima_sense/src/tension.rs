//! Value-tension detection: conflicts between anima dimensions.
//!
//! Three categories:
//! - **structural**: baked into the weight matrices (warmth and presence
//!   both pull on CPU; clarity and stability share the neural channel);
//! - **environmental**: smoothed gradients of two dimensions moving in
//!   opposite directions, each beyond its adaptive 2σ threshold, for three
//!   consecutive windows;
//! - **volitional**: an action boundary where two dimensions jumped ≥ 0.08
//!   in opposite directions.
//!
//! Operates on raw (pre-drift) anima only, so drift never masks a tension.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use anima_core::{Anima, Dimension};

use crate::agency::Action;

/// Gradient smoothing window, in ticks.
pub const GRADIENT_WINDOW: usize = 5;
/// History length for the adaptive threshold.
pub const THRESHOLD_HISTORY: usize = 100;
/// Consecutive windows required before an environmental event fires.
pub const ENVIRONMENTAL_STREAK: u32 = 3;
/// Per-dimension delta across an action boundary that counts as volitional.
pub const VOLITIONAL_DELTA: f32 = 0.08;
/// Ring-buffer cap on stored conflict events.
pub const EVENT_CAP: usize = 200;
/// Threshold floor so a perfectly flat history doesn't fire on noise.
const THRESHOLD_FLOOR: f32 = 0.004;

/// Dimension pairs in structural tension, derived from the weight matrices:
/// warmth↔presence contend through CPU, clarity↔stability through the
/// neural channel.
pub const STRUCTURAL_PAIRS: [(Dimension, Dimension); 2] = [
    (Dimension::Warmth, Dimension::Presence),
    (Dimension::Clarity, Dimension::Stability),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    Structural,
    Environmental,
    Volitional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub at: i64,
    pub dim_a: Dimension,
    pub dim_b: Dimension,
    pub gradient_a: f32,
    pub gradient_b: f32,
    pub duration_ticks: u32,
    pub category: ConflictCategory,
    pub action: Option<Action>,
}

const DIM_PAIRS: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

#[derive(Debug, Default)]
pub struct ValueTension {
    /// Raw anima samples for gradient smoothing.
    window: VecDeque<[f32; 4]>,
    /// Gradient history per dimension for the adaptive threshold.
    gradient_history: [VecDeque<f32>; 4],
    /// Consecutive-window streaks per dimension pair.
    streaks: HashMap<(usize, usize), u32>,
    events: VecDeque<ConflictEvent>,
    /// Volitional conflict tally per action.
    conflicts_by_action: HashMap<Action, u32>,
}

impl ValueTension {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_event(&mut self, event: ConflictEvent) {
        if self.events.len() == EVENT_CAP {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Adaptive 2σ threshold for a dimension's gradients.
    fn threshold(&self, dim: usize) -> f32 {
        let hist = &self.gradient_history[dim];
        if hist.len() < 10 {
            return THRESHOLD_FLOOR;
        }
        let n = hist.len() as f32;
        let mean = hist.iter().sum::<f32>() / n;
        let var = hist.iter().map(|g| (g - mean).powi(2)).sum::<f32>() / n;
        (2.0 * var.sqrt()).max(THRESHOLD_FLOOR)
    }

    /// Feed one tick of raw anima; returns environmental events emitted.
    pub fn observe(&mut self, raw: Anima, now: i64) -> Vec<ConflictEvent> {
        if self.window.len() == GRADIENT_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(raw.as_array());
        if self.window.len() < GRADIENT_WINDOW {
            return Vec::new();
        }

        // Smoothed gradient: span of the window divided by its length.
        let first = self.window.front().copied().unwrap_or([0.5; 4]);
        let last = self.window.back().copied().unwrap_or([0.5; 4]);
        let mut gradients = [0.0f32; 4];
        for i in 0..4 {
            gradients[i] = (last[i] - first[i]) / (GRADIENT_WINDOW - 1) as f32;
        }

        // Thresholds from history as it stood before this tick.
        let thresholds: [f32; 4] = [
            self.threshold(0),
            self.threshold(1),
            self.threshold(2),
            self.threshold(3),
        ];
        for i in 0..4 {
            if self.gradient_history[i].len() == THRESHOLD_HISTORY {
                self.gradient_history[i].pop_front();
            }
            self.gradient_history[i].push_back(gradients[i]);
        }

        let mut emitted = Vec::new();
        for (a, b) in DIM_PAIRS {
            let ga = gradients[a];
            let gb = gradients[b];
            let opposed = ga * gb < 0.0 && ga.abs() > thresholds[a] && gb.abs() > thresholds[b];
            let streak = self.streaks.entry((a, b)).or_insert(0);
            if opposed {
                *streak += 1;
                if *streak >= ENVIRONMENTAL_STREAK {
                    let duration = *streak;
                    *streak = 0;
                    let event = ConflictEvent {
                        at: now,
                        dim_a: Dimension::ALL[a],
                        dim_b: Dimension::ALL[b],
                        gradient_a: ga,
                        gradient_b: gb,
                        duration_ticks: duration,
                        category: ConflictCategory::Environmental,
                        action: None,
                    };
                    self.push_event(event.clone());
                    emitted.push(event);
                }
            } else {
                *streak = 0;
            }
        }
        emitted
    }

    /// Compare anima across an action boundary; emits volitional events.
    pub fn observe_action(
        &mut self,
        before: Anima,
        after: Anima,
        action: Action,
        now: i64,
    ) -> Vec<ConflictEvent> {
        let b = before.as_array();
        let a = after.as_array();
        let mut emitted = Vec::new();
        for (i, j) in DIM_PAIRS {
            let di = a[i] - b[i];
            let dj = a[j] - b[j];
            if di.abs() > VOLITIONAL_DELTA && dj.abs() > VOLITIONAL_DELTA && di * dj < 0.0 {
                let event = ConflictEvent {
                    at: now,
                    dim_a: Dimension::ALL[i],
                    dim_b: Dimension::ALL[j],
                    gradient_a: di,
                    gradient_b: dj,
                    duration_ticks: 1,
                    category: ConflictCategory::Volitional,
                    action: Some(action),
                };
                *self.conflicts_by_action.entry(action).or_insert(0) += 1;
                self.push_event(event.clone());
                emitted.push(event);
            }
        }
        emitted
    }

    /// Conflicts attributed to an action divided by its total uses.
    pub fn conflict_rate(&self, action: Action, uses: u32) -> f32 {
        if uses == 0 {
            return 0.0;
        }
        let conflicts = self.conflicts_by_action.get(&action).copied().unwrap_or(0);
        conflicts as f32 / uses as f32
    }

    /// Rates for every action given the agency's use counts.
    pub fn conflict_rates(&self, uses: impl Fn(Action) -> u32) -> HashMap<Action, f32> {
        Action::ALL
            .iter()
            .map(|a| (*a, self.conflict_rate(*a, uses(*a))))
            .collect()
    }

    pub fn events(&self) -> impl Iterator<Item = &ConflictEvent> {
        self.events.iter()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
