//! Server-side state and the polling orchestrator.
//!
//! The server holds no hardware. It polls the broker's snapshot, rebuilds
//! the learning state at the serialization boundary, composes schemas,
//! runs the reflection cadences, and owns every server-side file
//! (insights, knowledge, messages, last schema). All cadences are wrapped
//! so a failing one logs and the loop continues.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use anima_core::{
    AnimaConfig, ControlChannel, Freshness, HealthRegistry, SharedMemory, SharedSnapshot,
};
use anima_growth::{
    GoalBook, GoalContext, Journal, Preferences, SelfModel, TrajectoryAwareness,
    TrajectorySignature,
};
use anima_identity::IdentityStore;
use anima_schema::{BeliefFact, ComposeInputs, IdentityFacts, PrefFact, SchemaHub};
use anima_sense::{AnimaHistory, DriftField, BASIN_WINDOW};

use crate::reflect::{reflect, Insight, InjectionStrength, Insights, Metacognition};

/// Everything mutable on the server side, behind one lock so tool
/// handlers observe the single-writer invariant.
pub struct ServerMind {
    pub hub: SchemaHub,
    pub journal: Journal,
    pub goals: GoalBook,
    pub awareness: TrajectoryAwareness,
    pub insights: Insights,
    pub metacog: Metacognition,
    pub history: AnimaHistory,
    /// Last learning state parsed from the snapshot.
    pub prefs: Preferences,
    pub model: SelfModel,
    pub tick_count: u64,
    last_drawings_completed: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AnimaConfig,
    pub shm: SharedMemory,
    pub control: ControlChannel,
    pub store: IdentityStore,
    pub health: Arc<HealthRegistry>,
    pub mind: Arc<Mutex<ServerMind>>,
    pub started_at: i64,
}

impl AppState {
    pub async fn new(config: AnimaConfig) -> Result<Self> {
        let store = IdentityStore::open(config.db_path())
            .await
            .context("open identity store")?;

        let health = Arc::new(HealthRegistry::new());
        health.register("server", None, None);
        health.register("shared_memory", None, None);
        health.register(
            "schema",
            Some(anima_core::health::SLOW_STALE_SECONDS),
            None,
        );
        health.register(
            "reflection",
            Some(anima_core::health::SLOW_STALE_SECONDS),
            None,
        );

        let mut hub = SchemaHub::with_trajectory_interval(
            config.server.trajectory_interval_schemas,
        );
        let now_s = Utc::now().timestamp();
        hub.on_wake(&config.schema_path(), now_s);

        let mind = ServerMind {
            hub,
            journal: Journal::load_or_default(&config.knowledge_path()),
            goals: GoalBook::new(),
            awareness: TrajectoryAwareness::new(),
            insights: Insights::load_or_default(&config.insights_path()),
            metacog: Metacognition::new(),
            history: AnimaHistory::new(),
            prefs: Preferences::new(),
            model: SelfModel::new(),
            tick_count: 0,
            last_drawings_completed: 0,
        };

        Ok(Self {
            shm: SharedMemory::new(config.shm_path()),
            control: ControlChannel::new(config.control_path()),
            store,
            health,
            mind: Arc::new(Mutex::new(mind)),
            started_at: now_s,
            config,
        })
    }

    /// Current snapshot + freshness, surfacing staleness rather than
    /// retrying hard.
    pub fn read_snapshot(&self) -> Result<(SharedSnapshot, Freshness), anima_core::AnimaError> {
        self.shm.read_fresh(Utc::now())
    }

    /// One polling step. Never propagates component failures.
    pub async fn poll_once(&self) -> Result<()> {
        let now = Utc::now();
        let now_s = now.timestamp();
        self.health.heartbeat("server", now_s);

        let (snapshot, freshness) = match self.read_snapshot() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!("Snapshot unavailable: {}", e);
                self.health.mark_degraded("shared_memory");
                return Ok(());
            }
        };
        match freshness {
            Freshness::Fresh => self.health.heartbeat("shared_memory", now_s),
            Freshness::Stale { age_s } => {
                tracing::warn!(age_s, "Shared memory stale");
                self.health.mark_degraded("shared_memory");
            }
        }

        let identity = match self.store.identity(self.started_at).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!("Identity not yet recorded: {}", e);
                return Ok(());
            }
        };

        let mut mind = self.mind.lock().await;
        mind.tick_count += 1;
        let tick = mind.tick_count;

        // Rebuild learning state at the serialization boundary; a parse
        // failure keeps the previous copy.
        if let Ok(prefs) =
            serde_json::from_value::<Preferences>(snapshot.data.learning.preferences.clone())
        {
            mind.prefs = prefs;
        }
        if let Ok(model) =
            serde_json::from_value::<SelfModel>(snapshot.data.learning.self_beliefs.clone())
        {
            mind.model = model;
        }

        let anima = snapshot.data.anima;
        mind.history.push(now_s, &anima);

        // Metacognition: genuine surprise becomes an open question.
        if let Some((dim, err)) = mind.metacog.observe(&anima) {
            let question = format!(
                "what changed around me? my {} moved {:.2} in one breath",
                dim.as_str(),
                err
            );
            mind.journal.ask(&question, now);
            mind.insights.push(Insight {
                at: now_s,
                kind: "surprise".to_string(),
                text: question,
                strength: InjectionStrength::Medium,
            });
        }

        // Schema compose, every poll.
        let drift = DriftField::load_or_default(&self.config.drift_path());
        let identity_facts = IdentityFacts {
            birth_id: identity.birth_id,
            name: identity.name.clone(),
            awakenings: identity.awakenings,
            alive_ratio: identity.alive_ratio(now_s),
            age_days: identity.age_seconds(now_s) as f64 / 86_400.0,
        };
        let beliefs: Vec<BeliefFact> = mind
            .model
            .belief_summary()
            .into_iter()
            .map(|b| BeliefFact {
                id: b.id.clone(),
                value: b.value,
                confidence: b.confidence,
            })
            .collect();
        let prefs_facts: Vec<PrefFact> = anima_core::Dimension::ALL
            .iter()
            .map(|d| {
                let p = mind.prefs.dimension(*d);
                PrefFact {
                    dimension: *d,
                    preferred_value: p.preferred_value,
                    confidence: p.confidence,
                    influence_weight: p.influence_weight,
                }
            })
            .collect();
        mind.hub.compose(&ComposeInputs {
            now: now_s,
            identity: &identity_facts,
            anima,
            readings: &snapshot.data.readings,
            beliefs: &beliefs,
            preferences: &prefs_facts,
            drift_offsets: drift.offsets(),
        });
        self.health.heartbeat("schema", now_s);

        // Trajectory signature on the hub's recompute cadence.
        if tick % self.config.server.trajectory_interval_schemas == 0 {
            let basin = mind.history.attractor_basin(BASIN_WINDOW);
            let recovery = mind.model.recovery_profile();
            let signature = TrajectorySignature {
                preference_profile: anima_core::Dimension::ALL
                    .map(|d| mind.prefs.dimension(d).preferred_value),
                belief_signature: mind.model.belief_signature(),
                attractor: basin,
                recovery_profile: recovery.map(|t| t.unwrap_or(0.0)),
                relational_disposition: mind
                    .prefs
                    .categories()
                    .find(|c| c.category == "visitors")
                    .map(|c| ((c.polarity + 1.0) / 2.0))
                    .unwrap_or(0.5),
                homeostatic_identity: drift.midpoints(),
                computed_at: now_s,
                generation: 0,
            };
            mind.awareness.install(signature);
        }

        // Reflection cadence (~24 min).
        if tick % self.config.server.reflect_interval_ticks == 0 {
            let new_insights = reflect(now_s, &anima, &mind.prefs, &mind.model, &mind.goals);
            for insight in new_insights {
                mind.insights.push(insight);
            }
            if let Err(e) = mind.insights.save(&self.config.insights_path()) {
                tracing::warn!("Insights persist failed: {}", e);
            }
            self.health.heartbeat("reflection", now_s);
        }

        // Goal check (~10 min).
        if tick % self.config.server.goal_check_interval_ticks == 0 {
            let drawings_completed = snapshot
                .data
                .drawing
                .as_ref()
                .and_then(|d| d.pointer("/state/drawings_completed"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let delta =
                drawings_completed.saturating_sub(mind.last_drawings_completed) as u32;
            mind.last_drawings_completed = drawings_completed;

            let wellness = mind.prefs.wellness(&anima);
            let ctx = GoalContext {
                drawings_completed: delta,
                wellness,
            };
            let model = mind.model.clone();
            let journal_snapshot = mind.journal.clone();
            let completed = mind.goals.check(now, &ctx, &model, &journal_snapshot);
            // Achievements become memories; the broker stays the sole
            // writer of the SQLite file.
            for goal in completed {
                mind.journal
                    .remember("achievement", &format!("completed: {}", goal.description), now);
            }
            self.persist_journal(&mind);
        }

        // Goal suggestion (~2 h).
        if tick % self.config.server.goal_suggest_interval_ticks == 0 {
            let wellness = mind.prefs.wellness(&anima);
            let prefs = mind.prefs.clone();
            let model = mind.model.clone();
            let journal_snapshot = mind.journal.clone();
            if let Some(goal_id) = mind.goals.suggest(
                now,
                &prefs,
                &model,
                &journal_snapshot,
                wellness,
                identity.awakenings,
            ) {
                tracing::info!(goal_id, "New goal suggested");
            }
        }

        Ok(())
    }

    fn persist_journal(&self, mind: &ServerMind) {
        if let Err(e) = mind.journal.save(&self.config.knowledge_path()) {
            tracing::warn!("Journal persist failed: {}", e);
        }
        let visitors: Vec<_> = mind.journal.visitors().cloned().collect();
        if let Ok(bytes) = serde_json::to_vec_pretty(&visitors) {
            let path = self.config.messages_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let tmp = path.with_extension("json.tmp");
            if std::fs::write(&tmp, &bytes).is_ok() {
                std::fs::rename(&tmp, &path).ok();
            }
        }
    }

    /// Persist server-owned state on shutdown.
    pub async fn sleep(&self) {
        let mind = self.mind.lock().await;
        let now_s = Utc::now().timestamp();
        if let Err(e) = mind.hub.persist_schema(&self.config.schema_path(), now_s) {
            tracing::warn!("Schema persist failed: {}", e);
        }
        if let Err(e) = mind.insights.save(&self.config.insights_path()) {
            tracing::warn!("Insights persist failed: {}", e);
        }
        self.persist_journal(&mind);
        self.store.close().await;
    }
}

/// Run the polling loop until ctrl-c.
pub async fn run_orchestrator(state: AppState) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_millis(state.config.broker.tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = state.poll_once().await {
                    // Catch-all: log and continue (failure semantics).
                    tracing::error!("Server poll failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Server shutting down");
                break;
            }
        }
    }
    state.sleep().await;
    Ok(())
}
