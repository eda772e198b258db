//! The schema hub: composes the unified self-schema.
//!
//! Pipeline per compose: base extraction (identity, anima, sensors,
//! beliefs, preferences) → identity enrichment (existence ratio, awakening
//! count, age) → gap texture (a visible seam where time was lost, not a
//! hidden one) → bounded history → periodic trajectory feedback nodes
//! tagged with the generation that produced them.
//!
//! Composition is deterministic given identical inputs, and node ids are
//! unique within a schema.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use anima_core::{Anima, AnimaError, Dimension, SensorReadings};

pub const HISTORY_CAP: usize = 100;
pub const TRAJECTORY_INTERVAL: u64 = 20;
/// Gaps longer than this get texture nodes.
pub const GAP_THRESHOLD_SECONDS: i64 = 60;
/// Schemas contributing to identity maturity saturation.
const MATURITY_SCALE: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Identity,
    Anima,
    Sensor,
    Belief,
    Preference,
    Meta,
    Trajectory,
    Drift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Normalized to [0, 1] for rendering.
    pub value: f32,
    /// The unnormalized quantity, preserved.
    pub raw_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEdge {
    pub source_id: String,
    pub target_id: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfSchema {
    pub composed_at: i64,
    /// Trajectory generation whose feedback nodes are embedded (0 = none).
    pub generation: u64,
    pub nodes: Vec<SchemaNode>,
    pub edges: Vec<SchemaEdge>,
}

impl SelfSchema {
    pub fn node(&self, id: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn anima_values(&self) -> Option<Anima> {
        Some(Anima::new(
            self.node("anima_warmth")?.value,
            self.node("anima_clarity")?.value,
            self.node("anima_stability")?.value,
            self.node("anima_presence")?.value,
        ))
    }
}

/// Identity facts the hub needs (decoupled from the SQLite store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityFacts {
    pub birth_id: Uuid,
    pub name: String,
    pub awakenings: i64,
    pub alive_ratio: f64,
    pub age_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefFact {
    pub id: String,
    /// [-1, 1]
    pub value: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefFact {
    pub dimension: Dimension,
    pub preferred_value: f32,
    pub confidence: f32,
    pub influence_weight: f32,
}

/// Everything one compose consumes.
#[derive(Debug, Clone)]
pub struct ComposeInputs<'a> {
    pub now: i64,
    pub identity: &'a IdentityFacts,
    pub anima: Anima,
    pub readings: &'a SensorReadings,
    pub beliefs: &'a [BeliefFact],
    pub preferences: &'a [PrefFact],
    pub drift_offsets: [f32; 4],
}

/// Trajectory feedback derived from schema history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct TrajectoryFeedback {
    center: [f32; 4],
    total_variance: f32,
    identity_maturity: f32,
    attractor_position: f32,
    stability_score: f32,
    generation: u64,
}

/// Pending gap information, filled in at the first compose after wake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapDelta {
    pub gap_seconds: i64,
    pub prev_anima: Option<[f32; 4]>,
}

#[derive(Serialize, Deserialize)]
struct PersistedSchema {
    persisted_at: i64,
    schema: SelfSchema,
}

#[derive(Default)]
pub struct SchemaHub {
    history: VecDeque<SelfSchema>,
    compose_count: u64,
    trajectory_interval: u64,
    feedback: Option<TrajectoryFeedback>,
    generation: u64,
    last_gap_delta: Option<GapDelta>,
}

fn norm(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

impl SchemaHub {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAP),
            compose_count: 0,
            trajectory_interval: TRAJECTORY_INTERVAL,
            feedback: None,
            generation: 0,
            last_gap_delta: None,
        }
    }

    pub fn with_trajectory_interval(interval: u64) -> Self {
        Self {
            trajectory_interval: interval.max(1),
            ..Self::new()
        }
    }

    pub fn compose_count(&self) -> u64 {
        self.compose_count
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_gap_delta(&self) -> Option<&GapDelta> {
        self.last_gap_delta.as_ref()
    }

    pub fn current(&self) -> Option<&SelfSchema> {
        self.history.back()
    }

    /// Compose one schema. Deterministic in its inputs plus hub state.
    pub fn compose(&mut self, inputs: &ComposeInputs) -> SelfSchema {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        // 1. Base extraction.
        nodes.push(SchemaNode {
            id: "identity".to_string(),
            kind: NodeKind::Identity,
            label: inputs.identity.name.clone(),
            value: inputs.identity.alive_ratio.clamp(0.0, 1.0) as f32,
            raw_value: inputs.identity.alive_ratio,
        });

        for dim in Dimension::ALL {
            let id = format!("anima_{}", dim.as_str());
            nodes.push(SchemaNode {
                id: id.clone(),
                kind: NodeKind::Anima,
                label: dim.as_str().to_string(),
                value: inputs.anima.get(dim),
                raw_value: inputs.anima.get(dim) as f64,
            });
            edges.push(SchemaEdge {
                source_id: "identity".to_string(),
                target_id: id,
                weight: 1.0,
            });
        }

        self.extract_sensor_nodes(inputs.readings, &mut nodes, &mut edges);

        for belief in inputs.beliefs {
            let id = format!("belief_{}", belief.id);
            nodes.push(SchemaNode {
                id: id.clone(),
                kind: NodeKind::Belief,
                label: belief.id.clone(),
                value: ((belief.value + 1.0) / 2.0).clamp(0.0, 1.0),
                raw_value: belief.value as f64,
            });
            edges.push(SchemaEdge {
                source_id: id,
                target_id: "identity".to_string(),
                weight: belief.confidence,
            });
        }

        for pref in inputs.preferences {
            let id = format!("pref_{}", pref.dimension.as_str());
            nodes.push(SchemaNode {
                id: id.clone(),
                kind: NodeKind::Preference,
                label: format!("{} preference", pref.dimension.as_str()),
                value: pref.preferred_value.clamp(0.0, 1.0),
                raw_value: pref.influence_weight as f64,
            });
            edges.push(SchemaEdge {
                source_id: id,
                target_id: format!("anima_{}", pref.dimension.as_str()),
                weight: pref.confidence,
            });
        }

        // Drift offsets make the creature's walked-away-from-factory state
        // visible.
        for dim in Dimension::ALL {
            let offset = inputs.drift_offsets[dim.index()];
            if offset.abs() < 1e-4 {
                continue;
            }
            nodes.push(SchemaNode {
                id: format!("drift_{}", dim.as_str()),
                kind: NodeKind::Drift,
                label: format!("{} midpoint drift", dim.as_str()),
                value: norm(offset, -0.2, 0.2),
                raw_value: offset as f64,
            });
        }

        // 2. Identity enrichment.
        nodes.push(SchemaNode {
            id: "meta_existence_ratio".to_string(),
            kind: NodeKind::Meta,
            label: "existence ratio".to_string(),
            value: inputs.identity.alive_ratio.clamp(0.0, 1.0) as f32,
            raw_value: inputs.identity.alive_ratio,
        });
        let awakenings = inputs.identity.awakenings.max(1) as f64;
        nodes.push(SchemaNode {
            id: "meta_awakening_count".to_string(),
            kind: NodeKind::Meta,
            label: "awakenings".to_string(),
            value: ((awakenings.log10() / 2.0).min(1.0)) as f32,
            raw_value: inputs.identity.awakenings as f64,
        });
        nodes.push(SchemaNode {
            id: "meta_age_days".to_string(),
            kind: NodeKind::Meta,
            label: "age".to_string(),
            value: ((inputs.identity.age_days / 100.0).min(1.0)) as f32,
            raw_value: inputs.identity.age_days,
        });

        // 3. Gap texture, consumed by exactly one compose.
        if let Some(gap) = self.last_gap_delta.take() {
            nodes.push(SchemaNode {
                id: "meta_gap_duration".to_string(),
                kind: NodeKind::Meta,
                label: "time lost".to_string(),
                value: (gap.gap_seconds as f32 / 86_400.0).min(1.0),
                raw_value: gap.gap_seconds as f64,
            });
            let delta = gap
                .prev_anima
                .map(|prev| {
                    let cur = inputs.anima.as_array();
                    (0..4).map(|i| (cur[i] - prev[i]).abs()).sum::<f32>()
                })
                .unwrap_or(0.0);
            nodes.push(SchemaNode {
                id: "meta_state_delta".to_string(),
                kind: NodeKind::Meta,
                label: "how much changed while away".to_string(),
                value: (delta / 4.0).clamp(0.0, 1.0),
                raw_value: delta as f64,
            });
        }

        // 5. Trajectory feedback from the last recompute.
        if let Some(fb) = &self.feedback {
            nodes.push(SchemaNode {
                id: "traj_identity_maturity".to_string(),
                kind: NodeKind::Trajectory,
                label: "identity maturity".to_string(),
                value: fb.identity_maturity,
                raw_value: fb.generation as f64,
            });
            nodes.push(SchemaNode {
                id: "traj_attractor_position".to_string(),
                kind: NodeKind::Trajectory,
                label: "attractor position".to_string(),
                value: fb.attractor_position,
                raw_value: fb.center.iter().sum::<f32>() as f64,
            });
            nodes.push(SchemaNode {
                id: "traj_stability_score".to_string(),
                kind: NodeKind::Trajectory,
                label: "trajectory stability".to_string(),
                value: fb.stability_score,
                raw_value: fb.total_variance as f64,
            });
            edges.push(SchemaEdge {
                source_id: "traj_stability_score".to_string(),
                target_id: "anima_stability".to_string(),
                weight: fb.stability_score,
            });
        }

        let schema = SelfSchema {
            composed_at: inputs.now,
            generation: self.feedback.map(|f| f.generation).unwrap_or(0),
            nodes,
            edges,
        };

        // 4. Bounded history.
        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(schema.clone());
        self.compose_count += 1;

        // Periodic trajectory recompute.
        if self.compose_count % self.trajectory_interval == 0 {
            self.recompute_trajectory();
        }

        schema
    }

    fn extract_sensor_nodes(
        &self,
        readings: &SensorReadings,
        nodes: &mut Vec<SchemaNode>,
        edges: &mut Vec<SchemaEdge>,
    ) {
        let mut add = |id: &str, raw: f32, value: f32, target: &str| {
            nodes.push(SchemaNode {
                id: format!("sensor_{id}"),
                kind: NodeKind::Sensor,
                label: id.to_string(),
                value,
                raw_value: raw as f64,
            });
            edges.push(SchemaEdge {
                source_id: format!("sensor_{id}"),
                target_id: target.to_string(),
                weight: 0.5,
            });
        };

        if let Some(v) = readings.cpu_temp_c {
            add("cpu_temp_c", v, norm(v, 20.0, 90.0), "anima_warmth");
        }
        if let Some(v) = readings.ambient_temp_c {
            add("ambient_temp_c", v, norm(v, -10.0, 50.0), "anima_warmth");
        }
        if let Some(v) = readings.humidity_pct {
            add("humidity_pct", v, norm(v, 0.0, 100.0), "anima_stability");
        }
        if let Some(v) = readings.pressure_hpa {
            add("pressure_hpa", v, norm(v, 950.0, 1050.0), "anima_stability");
        }
        if let Some(v) = readings.world_light_lux {
            add(
                "world_light_lux",
                v,
                ((1.0 + v.max(0.0)).ln() / (1.0f32 + 1000.0).ln()).clamp(0.0, 1.0),
                "anima_clarity",
            );
        }
        if let Some(v) = readings.cpu_pct {
            add("cpu_pct", v, norm(v, 0.0, 100.0), "anima_presence");
        }
        if let Some(v) = readings.mem_pct {
            add("mem_pct", v, norm(v, 0.0, 100.0), "anima_presence");
        }
    }

    /// Recompute trajectory feedback from the schema history's anima nodes.
    fn recompute_trajectory(&mut self) {
        let points: Vec<[f32; 4]> = self
            .history
            .iter()
            .filter_map(|s| s.anima_values().map(|a| a.as_array()))
            .collect();
        if points.is_empty() {
            return;
        }
        let n = points.len() as f32;
        let mut center = [0.0f32; 4];
        for p in &points {
            for i in 0..4 {
                center[i] += p[i];
            }
        }
        for c in &mut center {
            *c /= n;
        }
        let mut total_variance = 0.0;
        for i in 0..4 {
            let var =
                points.iter().map(|p| (p[i] - center[i]).powi(2)).sum::<f32>() / n;
            total_variance += var;
        }

        self.generation += 1;
        self.feedback = Some(TrajectoryFeedback {
            center,
            total_variance,
            identity_maturity: (points.len() as f32 / MATURITY_SCALE).min(1.0),
            attractor_position: center.iter().sum::<f32>() / 4.0,
            stability_score: (1.0 - 10.0 * total_variance).max(0.0),
            generation: self.generation,
        });
        tracing::debug!(generation = self.generation, "Trajectory feedback recomputed");
    }

    /// Persist the current schema on sleep.
    pub fn persist_schema(&self, path: &Path, now: i64) -> Result<(), AnimaError> {
        let Some(schema) = self.current() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let persisted = PersistedSchema {
            persisted_at: now,
            schema: schema.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load the persisted schema on wake. A gap longer than the threshold
    /// arms the gap texture for the next compose; anima deltas are filled
    /// there, against the first real post-wake state.
    pub fn on_wake(&mut self, path: &Path, now: i64) {
        let Ok(bytes) = fs::read(path) else {
            return;
        };
        let Ok(persisted) = serde_json::from_slice::<PersistedSchema>(&bytes) else {
            tracing::warn!("Persisted schema unreadable, waking without gap texture");
            return;
        };
        let gap = now - persisted.persisted_at;
        if gap > GAP_THRESHOLD_SECONDS {
            self.last_gap_delta = Some(GapDelta {
                gap_seconds: gap,
                prev_anima: persisted.schema.anima_values().map(|a| a.as_array()),
            });
            tracing::info!(gap_seconds = gap, "Waking across a gap");
        }
        // The persisted schema seeds history so trajectory feedback has a
        // thread of continuity.
        if self.history.is_empty() {
            self.history.push_back(persisted.schema);
        }
    }
}
