//! The self-model: beliefs with evidence counts, stability-recovery
//! episodes, and the recovery profile.
//!
//! Beliefs update Bayesian-style: supporting/contradicting evidence counts
//! feed confidence, and the belief value itself tracks the evidence EMA.
//! Episodes open when a dimension drops below 0.3 and close on recovery
//! past 0.5; closed episodes yield per-dimension recovery time constants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use anima_core::{Anima, Dimension};

/// A dimension value this low opens a recovery episode.
pub const EPISODE_OPEN_THRESHOLD: f32 = 0.3;
/// Recovery past this closes it.
pub const EPISODE_CLOSE_THRESHOLD: f32 = 0.5;
/// Closed episodes kept per dimension.
pub const EPISODE_CAP: usize = 50;
const BELIEF_EMA_ALPHA: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfBelief {
    pub id: String,
    pub dimension: Dimension,
    /// Belief direction/strength in [-1, 1]: e.g. "my warmth runs high" at
    /// +0.6 means the creature believes it lives above its midpoint.
    pub value: f32,
    /// Confidence in [0, 1] from accumulated evidence.
    pub confidence: f32,
    pub supporting_count: u32,
    pub contradicting_count: u32,
    pub last_evidence_at: i64,
}

impl SelfBelief {
    fn new(id: String, dimension: Dimension) -> Self {
        Self {
            id,
            dimension,
            value: 0.0,
            confidence: 0.0,
            supporting_count: 0,
            contradicting_count: 0,
            last_evidence_at: 0,
        }
    }

    /// Evidence update: counts drive confidence, the value follows an EMA
    /// of the observed direction.
    pub fn update(&mut self, observed_direction: f32, now: i64) {
        let supports = observed_direction.signum() == self.value.signum() || self.value == 0.0;
        if supports {
            self.supporting_count += 1;
        } else {
            self.contradicting_count += 1;
        }
        self.value += BELIEF_EMA_ALPHA * (observed_direction.clamp(-1.0, 1.0) - self.value);
        let total = self.supporting_count + self.contradicting_count;
        if total > 0 {
            // Agreement fraction, discounted while evidence is thin.
            let agreement = self.supporting_count as f32 / total as f32;
            let volume = (total as f32 / 30.0).min(1.0);
            self.confidence = agreement * volume;
        }
        self.last_evidence_at = now;
    }
}

/// One low-dimension episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub dimension: Dimension,
    pub opened_at: i64,
    pub start_value: f32,
    pub closed_at: Option<i64>,
    pub end_value: Option<f32>,
}

impl Episode {
    pub fn recovery_seconds(&self) -> Option<i64> {
        self.closed_at.map(|c| c - self.opened_at)
    }

    /// Exponential time constant from this episode:
    /// `τ = −t / ln(1 − fraction)` with fraction the recovered share of the
    /// distance from the low point to full scale.
    pub fn tau(&self) -> Option<f32> {
        let t = self.recovery_seconds()? as f32;
        let end = self.end_value?;
        let fraction = ((end - self.start_value) / (1.0 - self.start_value)).clamp(0.01, 0.99);
        let denom = (1.0 - fraction).ln();
        if denom >= 0.0 {
            return None;
        }
        Some(-t / denom)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelfModel {
    beliefs: BTreeMap<String, SelfBelief>,
    open_episodes: BTreeMap<String, Episode>,
    closed_episodes: Vec<Episode>,
}

impl SelfModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observed anima. Derives evidence for the per-dimension
    /// "runs high/low" beliefs and advances episode tracking.
    pub fn observe(&mut self, anima: &Anima, now: i64) {
        for dim in Dimension::ALL {
            let v = anima.get(dim);
            let id = format!("{}_tendency", dim.as_str());
            let belief = self
                .beliefs
                .entry(id.clone())
                .or_insert_with(|| SelfBelief::new(id, dim));
            // Direction: where this dimension sits relative to neutral.
            belief.update((v - 0.5) * 2.0, now);

            self.track_episode(dim, v, now);
        }
    }

    fn track_episode(&mut self, dim: Dimension, value: f32, now: i64) {
        let key = dim.as_str().to_string();
        match self.open_episodes.get(&key) {
            None => {
                if value < EPISODE_OPEN_THRESHOLD {
                    self.open_episodes.insert(
                        key,
                        Episode {
                            dimension: dim,
                            opened_at: now,
                            start_value: value,
                            closed_at: None,
                            end_value: None,
                        },
                    );
                }
            }
            Some(_) => {
                if value >= EPISODE_CLOSE_THRESHOLD {
                    let mut episode = self.open_episodes.remove(&key).expect("episode present");
                    episode.closed_at = Some(now);
                    episode.end_value = Some(value);
                    if self.closed_episodes.len() == EPISODE_CAP {
                        self.closed_episodes.remove(0);
                    }
                    self.closed_episodes.push(episode);
                }
            }
        }
    }

    /// Direct evidence injection (e.g. from reflection or a belief test).
    pub fn add_evidence(&mut self, belief_id: &str, supports: bool, now: i64) {
        if let Some(belief) = self.beliefs.get_mut(belief_id) {
            let along = if belief.value >= 0.0 { 0.5 } else { -0.5 };
            let direction = if supports { along } else { -along };
            belief.update(direction, now);
        }
    }

    pub fn belief(&self, id: &str) -> Option<&SelfBelief> {
        self.beliefs.get(id)
    }

    pub fn belief_summary(&self) -> Vec<&SelfBelief> {
        self.beliefs.values().collect()
    }

    /// Deterministic signature vector: confidence-weighted belief values in
    /// id order.
    pub fn belief_signature(&self) -> Vec<f32> {
        self.beliefs
            .values()
            .map(|b| b.value * b.confidence)
            .collect()
    }

    /// Median recovery τ per dimension across closed episodes.
    pub fn recovery_profile(&self) -> [Option<f32>; 4] {
        let mut profile = [None; 4];
        for dim in Dimension::ALL {
            let mut taus: Vec<f32> = self
                .closed_episodes
                .iter()
                .filter(|e| e.dimension == dim)
                .filter_map(|e| e.tau())
                .collect();
            if taus.is_empty() {
                continue;
            }
            taus.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            profile[dim.index()] = Some(taus[taus.len() / 2]);
        }
        profile
    }

    pub fn open_episode_count(&self) -> usize {
        self.open_episodes.len()
    }

    pub fn closed_episode_count(&self) -> usize {
        self.closed_episodes.len()
    }

    /// Snapshot for the shared-memory learning block.
    pub fn snapshot(&self) -> serde_json::Value {
        let beliefs: serde_json::Map<String, serde_json::Value> = self
            .beliefs
            .iter()
            .map(|(id, b)| {
                (
                    id.clone(),
                    serde_json::json!({
                        "value": b.value,
                        "confidence": b.confidence,
                        "supporting": b.supporting_count,
                        "contradicting": b.contradicting_count,
                    }),
                )
            })
            .collect();
        serde_json::Value::Object(beliefs)
    }
}
