//! Preferences: what the creature has learned to like.
//!
//! Per-dimension ideal points learned from occupied states (learning rate
//! 0.05), plus free-form category preferences. Influence weights are
//! conserved: each ≥ 0.3 and the four dimension weights always sum to 4.0.
//! The meta-weighting cycle (see `meta.rs`) is the only writer of weights.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anima_core::{Anima, AnimaError, Dimension};

pub const PREF_LEARNING_RATE: f32 = 0.05;
pub const WEIGHT_FLOOR: f32 = 0.3;
pub const WEIGHT_TOTAL: f32 = 4.0;
/// Observations before confidence saturates.
const CONFIDENCE_SCALE: f32 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionPreference {
    pub dimension: Dimension,
    /// Learned ideal point in [0, 1].
    pub preferred_value: f32,
    pub confidence: f32,
    pub observation_count: u32,
    /// Conserved influence weight, floor 0.3, Σ over dims = 4.0.
    pub influence_weight: f32,
}

impl DimensionPreference {
    fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            preferred_value: 0.5,
            confidence: 0.0,
            observation_count: 0,
            influence_weight: 1.0,
        }
    }

    /// Satisfaction with an observed value: 1 at the ideal point, falling
    /// linearly to 0 half a scale away.
    pub fn satisfaction(&self, value: f32) -> f32 {
        (1.0 - 2.0 * (value - self.preferred_value).abs()).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPreference {
    pub category: String,
    /// Like/dislike polarity in [-1, 1].
    pub polarity: f32,
    pub confidence: f32,
    pub observation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    dims: [DimensionPreference; 4],
    categories: BTreeMap<String, CategoryPreference>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dims: [
                DimensionPreference::new(Dimension::Warmth),
                DimensionPreference::new(Dimension::Clarity),
                DimensionPreference::new(Dimension::Stability),
                DimensionPreference::new(Dimension::Presence),
            ],
            categories: BTreeMap::new(),
        }
    }
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self, dim: Dimension) -> &DimensionPreference {
        &self.dims[dim.index()]
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryPreference> {
        self.categories.values()
    }

    /// Learn from an occupied state: ideal points drift toward where the
    /// creature actually lives.
    pub fn observe(&mut self, anima: &Anima) {
        for dim in Dimension::ALL {
            let p = &mut self.dims[dim.index()];
            p.preferred_value +=
                PREF_LEARNING_RATE * (anima.get(dim) - p.preferred_value);
            p.preferred_value = p.preferred_value.clamp(0.0, 1.0);
            p.observation_count += 1;
            p.confidence = (p.observation_count as f32 / CONFIDENCE_SCALE).min(1.0);
        }
    }

    /// Record a liked/disliked experience in a free-form category.
    pub fn observe_category(&mut self, category: &str, valence: f32) {
        let entry = self
            .categories
            .entry(category.to_string())
            .or_insert_with(|| CategoryPreference {
                category: category.to_string(),
                polarity: 0.0,
                confidence: 0.0,
                observation_count: 0,
            });
        entry.polarity += PREF_LEARNING_RATE * (valence.clamp(-1.0, 1.0) - entry.polarity);
        entry.observation_count += 1;
        entry.confidence = (entry.observation_count as f32 / CONFIDENCE_SCALE).min(1.0);
    }

    /// Per-dimension satisfaction with the current anima.
    pub fn satisfaction(&self, anima: &Anima) -> [f32; 4] {
        let mut s = [0.0; 4];
        for dim in Dimension::ALL {
            s[dim.index()] = self.dims[dim.index()].satisfaction(anima.get(dim));
        }
        s
    }

    /// Preference-weighted satisfaction composite: the wellness signal
    /// consumed by goal suggestion, agency and drawing autonomy.
    pub fn wellness(&self, anima: &Anima) -> f32 {
        let sat = self.satisfaction(anima);
        let mut num = 0.0;
        let mut den = 0.0;
        for dim in Dimension::ALL {
            let w = self.dims[dim.index()].influence_weight;
            num += w * sat[dim.index()];
            den += w;
        }
        if den == 0.0 {
            return 0.5;
        }
        num / den
    }

    pub fn weights(&self) -> [f32; 4] {
        let mut w = [0.0; 4];
        for dim in Dimension::ALL {
            w[dim.index()] = self.dims[dim.index()].influence_weight;
        }
        w
    }

    /// Install new weights, enforcing the floor and the conservation law.
    pub fn set_weights(&mut self, weights: [f32; 4]) {
        let mut w = weights.map(|v| v.max(WEIGHT_FLOOR));
        let sum: f32 = w.iter().sum();
        if sum > 0.0 {
            for v in &mut w {
                *v *= WEIGHT_TOTAL / sum;
            }
        }
        // Renormalising can push a weight back under the floor; one more
        // pass pinning floored weights keeps both constraints.
        let mut pinned = [false; 4];
        for _ in 0..4 {
            let mut floor_sum = 0.0;
            let mut free_sum = 0.0;
            for i in 0..4 {
                if w[i] < WEIGHT_FLOOR {
                    w[i] = WEIGHT_FLOOR;
                    pinned[i] = true;
                }
                if pinned[i] {
                    floor_sum += w[i];
                } else {
                    free_sum += w[i];
                }
            }
            if free_sum <= 0.0 {
                break;
            }
            let target_free = WEIGHT_TOTAL - floor_sum;
            let scale = target_free / free_sum;
            let mut changed = false;
            for i in 0..4 {
                if !pinned[i] {
                    w[i] *= scale;
                    if w[i] < WEIGHT_FLOOR {
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        for dim in Dimension::ALL {
            self.dims[dim.index()].influence_weight = w[dim.index()];
        }
    }

    /// Strongest dimension preferences (for goal suggestion).
    pub fn strong_dimensions(&self, min_confidence: f32) -> Vec<&DimensionPreference> {
        self.dims
            .iter()
            .filter(|p| p.confidence > min_confidence)
            .collect()
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
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    /// Snapshot for the shared-memory learning block.
    pub fn snapshot(&self) -> serde_json::Value {
        let dims: serde_json::Map<String, serde_json::Value> = Dimension::ALL
            .iter()
            .map(|d| {
                let p = self.dimension(*d);
                (
                    d.as_str().to_string(),
                    serde_json::json!({
                        "preferred_value": p.preferred_value,
                        "confidence": p.confidence,
                        "influence_weight": p.influence_weight,
                        "observations": p.observation_count,
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "dimensions": dims,
            "categories": self.categories,
        })
    }
}
