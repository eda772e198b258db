//! Attention signals driving the drawing session.
//!
//! - curiosity depletes while coherence is low (exploring costs) and
//!   regenerates while a pattern holds;
//! - engagement rises with intentionality and falls with entropy;
//! - fatigue only accumulates, a little per tick and more per gesture
//!   switch;
//! - energy is the composite the narrative arc reads.

use serde::{Deserialize, Serialize};

const CURIOSITY_DEPLETE: f32 = 0.010;
const CURIOSITY_REGEN: f32 = 0.008;
const LOW_COHERENCE: f32 = 0.4;
const HIGH_COHERENCE: f32 = 0.6;
const ENGAGEMENT_RATE: f32 = 0.06;
const FATIGUE_BASE: f32 = 0.0006;
const FATIGUE_PER_SWITCH: f32 = 0.004;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attention {
    pub curiosity: f32,
    pub engagement: f32,
    pub fatigue: f32,
}

impl Default for Attention {
    fn default() -> Self {
        Self {
            curiosity: 1.0,
            engagement: 0.5,
            fatigue: 0.0,
        }
    }
}

impl Attention {
    pub fn new() -> Self {
        Self::default()
    }

    /// One tick of attention dynamics.
    pub fn update(
        &mut self,
        coherence: f32,
        intentionality: f32,
        entropy: f32,
        gesture_switched: bool,
    ) {
        if coherence < LOW_COHERENCE {
            self.curiosity -= CURIOSITY_DEPLETE;
        } else if coherence > HIGH_COHERENCE {
            self.curiosity += CURIOSITY_REGEN;
        }
        self.curiosity = self.curiosity.clamp(0.0, 1.0);

        let target = (intentionality - 0.5 * entropy).clamp(0.0, 1.0);
        self.engagement += ENGAGEMENT_RATE * (target - self.engagement);
        self.engagement = self.engagement.clamp(0.0, 1.0);

        self.fatigue += FATIGUE_BASE;
        if gesture_switched {
            self.fatigue += FATIGUE_PER_SWITCH;
        }
        self.fatigue = self.fatigue.min(1.0);
    }

    /// Composite creative energy.
    pub fn energy(&self) -> f32 {
        0.6 * self.curiosity + 0.4 * self.engagement * (1.0 - 0.5 * self.fatigue)
    }

    /// Nothing left to spend: curiosity gone and energy low.
    pub fn exhausted(&self) -> bool {
        self.curiosity < 0.05 && self.energy() < 0.25
    }
}
