//! The narrative arc of a drawing: opening → developing → resolving →
//! closing.
//!
//! Transitions:
//! - opening: fresh canvas, or regression when intentionality momentum
//!   collapses;
//! - developing: momentum > 0.4 with at least 10 marks down;
//! - resolving: coherence above 0.6 and its velocity flat for 5 ticks;
//! - closing: coherence settled and attention exhausted.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::attention::Attention;

pub const DEVELOPING_MOMENTUM: f32 = 0.4;
pub const DEVELOPING_MIN_MARKS: u64 = 10;
pub const RESOLVING_COHERENCE: f32 = 0.6;
/// |dC| below this counts as stable.
pub const COHERENCE_EPSILON: f32 = 0.01;
pub const STABLE_TICKS: usize = 5;
const REGRESSION_MOMENTUM: f32 = 0.15;
const MOMENTUM_ALPHA: f32 = 0.1;
const COHERENCE_HISTORY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePhase {
    Opening,
    Developing,
    Resolving,
    Closing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeArc {
    phase: NarrativePhase,
    /// EMA of intentionality.
    momentum: f32,
    coherence_history: VecDeque<f32>,
    stable_ticks: usize,
}

impl Default for NarrativeArc {
    fn default() -> Self {
        Self {
            phase: NarrativePhase::Opening,
            momentum: 0.0,
            coherence_history: VecDeque::with_capacity(COHERENCE_HISTORY),
            stable_ticks: 0,
        }
    }
}

impl NarrativeArc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> NarrativePhase {
        self.phase
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn coherence_velocity(&self) -> f32 {
        let n = self.coherence_history.len();
        if n < 2 {
            return 0.0;
        }
        self.coherence_history[n - 1] - self.coherence_history[n - 2]
    }

    pub fn coherence_settled(&self) -> bool {
        self.stable_ticks >= STABLE_TICKS
    }

    /// Reset for a fresh canvas.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One tick of arc progression.
    pub fn update(
        &mut self,
        coherence: f32,
        intentionality: f32,
        marks: u64,
        attention: &Attention,
    ) {
        self.momentum += MOMENTUM_ALPHA * (intentionality - self.momentum);

        if self.coherence_history.len() == COHERENCE_HISTORY {
            self.coherence_history.pop_front();
        }
        self.coherence_history.push_back(coherence);

        if self.coherence_velocity().abs() < COHERENCE_EPSILON
            && self.coherence_history.len() >= 2
        {
            self.stable_ticks += 1;
        } else {
            self.stable_ticks = 0;
        }

        self.phase = match self.phase {
            NarrativePhase::Opening => {
                if self.momentum > DEVELOPING_MOMENTUM && marks >= DEVELOPING_MIN_MARKS {
                    NarrativePhase::Developing
                } else {
                    NarrativePhase::Opening
                }
            }
            NarrativePhase::Developing => {
                if self.momentum < REGRESSION_MOMENTUM {
                    NarrativePhase::Opening
                } else if coherence > RESOLVING_COHERENCE && self.coherence_settled() {
                    NarrativePhase::Resolving
                } else {
                    NarrativePhase::Developing
                }
            }
            NarrativePhase::Resolving => {
                if self.momentum < REGRESSION_MOMENTUM {
                    NarrativePhase::Opening
                } else if self.coherence_settled() && attention.exhausted() {
                    NarrativePhase::Closing
                } else {
                    NarrativePhase::Resolving
                }
            }
            NarrativePhase::Closing => NarrativePhase::Closing,
        };
    }

    /// The drawing has said what it had to say.
    pub fn narrative_complete(&self) -> bool {
        self.phase == NarrativePhase::Closing
    }
}
