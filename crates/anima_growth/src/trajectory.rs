//! Trajectory signature Σ: identity through time.
//!
//! Σ = {Π preference profile, Β belief signature, Α attractor basin,
//! Ρ recovery profile, Δ relational disposition, Η homeostatic identity}.
//! A genesis signature is snapshotted once; `lineage_similarity` measures
//! how far the creature has walked from who it was born as.

use serde::{Deserialize, Serialize};

use anima_sense::AttractorBasin;

const SIM_W_PREFERENCES: f32 = 0.25;
const SIM_W_BELIEFS: f32 = 0.20;
const SIM_W_ATTRACTOR: f32 = 0.25;
const SIM_W_RECOVERY: f32 = 0.10;
const SIM_W_RELATIONAL: f32 = 0.10;
const SIM_W_HOMEOSTATIC: f32 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySignature {
    /// Π: learned ideal points per dimension.
    pub preference_profile: [f32; 4],
    /// Β: confidence-weighted belief values, id-ordered.
    pub belief_signature: Vec<f32>,
    /// Α: where the creature lives in state space.
    pub attractor: AttractorBasin,
    /// Ρ: median recovery τ per dimension, seconds (0 = unknown).
    pub recovery_profile: [f32; 4],
    /// Δ: disposition toward interaction in [0, 1].
    pub relational_disposition: f32,
    /// Η: drifted calibration midpoints.
    pub homeostatic_identity: [f32; 4],
    pub computed_at: i64,
    /// Counts every recompute; readers use it to tell which trajectory
    /// produced downstream feedback nodes.
    pub generation: u64,
}

fn vec4_similarity(a: &[f32; 4], b: &[f32; 4], scale: f32) -> f32 {
    let dist: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f32>()
        / 4.0;
    (1.0 - dist / scale).clamp(0.0, 1.0)
}

fn slice_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let n = a.len().max(b.len());
    let mut dist = 0.0;
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0.0);
        let y = b.get(i).copied().unwrap_or(0.0);
        dist += (x - y).abs();
    }
    (1.0 - dist / (2.0 * n as f32)).clamp(0.0, 1.0)
}

impl TrajectorySignature {
    /// Weighted similarity to another signature, in [0, 1].
    pub fn similarity(&self, other: &TrajectorySignature) -> f32 {
        let pref = vec4_similarity(&self.preference_profile, &other.preference_profile, 1.0);
        let beliefs = slice_similarity(&self.belief_signature, &other.belief_signature);
        let attractor = vec4_similarity(&self.attractor.mean, &other.attractor.mean, 1.0);
        // Recovery τ compared on a log scale so 100 s vs 200 s differs as
        // much as 1000 s vs 2000 s.
        let mut recovery = 0.0;
        for i in 0..4 {
            let a = (1.0 + self.recovery_profile[i]).ln();
            let b = (1.0 + other.recovery_profile[i]).ln();
            let max = a.max(b).max(1.0);
            recovery += 1.0 - ((a - b).abs() / max).min(1.0);
        }
        recovery /= 4.0;
        let relational =
            1.0 - (self.relational_disposition - other.relational_disposition).abs();
        let homeostatic =
            vec4_similarity(&self.homeostatic_identity, &other.homeostatic_identity, 0.8);

        (SIM_W_PREFERENCES * pref
            + SIM_W_BELIEFS * beliefs
            + SIM_W_ATTRACTOR * attractor
            + SIM_W_RECOVERY * recovery
            + SIM_W_RELATIONAL * relational
            + SIM_W_HOMEOSTATIC * homeostatic)
            .clamp(0.0, 1.0)
    }
}

/// Holds the current signature and the genesis snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryAwareness {
    pub current: Option<TrajectorySignature>,
    pub genesis: Option<TrajectorySignature>,
    generation: u64,
}

impl TrajectoryAwareness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly computed signature; the first one ever becomes
    /// the genesis.
    pub fn install(&mut self, mut signature: TrajectorySignature) {
        self.generation += 1;
        signature.generation = self.generation;
        if self.genesis.is_none() {
            self.genesis = Some(signature.clone());
            tracing::info!("Genesis trajectory signature recorded");
        }
        self.current = Some(signature);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Similarity of the current signature to the genesis snapshot.
    pub fn lineage_similarity(&self) -> Option<f32> {
        match (&self.current, &self.genesis) {
            (Some(c), Some(g)) => Some(c.similarity(g)),
            _ => None,
        }
    }
}
