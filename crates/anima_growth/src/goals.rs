//! Goals: where autonomous behavior points itself.
//!
//! Suggested on a slow cadence from strong preferences, recurring
//! curiosity, milestones, low-confidence beliefs worth testing, and low
//! wellness. At most two active at a time. Progress tracking is
//! source-specific; stale goals abandon themselves; achievements become
//! memories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::beliefs::SelfModel;
use crate::journal::Journal;
use crate::preferences::Preferences;

pub const MAX_ACTIVE_GOALS: usize = 2;
/// Progress below this past the target date means the goal never took.
pub const STALE_PROGRESS: f32 = 0.1;
pub const BELIEF_TEST_COMPLETE_HIGH: f32 = 0.7;
pub const BELIEF_TEST_COMPLETE_LOW: f32 = 0.2;
const LOW_WELLNESS: f32 = 0.4;
const STRONG_PREF_CONFIDENCE: f32 = 0.7;
const RECURRING_QUESTION_COUNT: u32 = 2;
/// Beliefs this uncertain are worth testing.
const TESTABLE_BELIEF_CONFIDENCE: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalSource {
    /// Lean into a strong preference (e.g. draw more).
    Preference { category: String },
    /// A question curiosity keeps returning to.
    Curiosity { question_id: u64 },
    /// An age/awakening milestone.
    Milestone,
    /// Probe a belief the creature isn't sure about.
    BeliefTest { belief_id: String },
    /// Wellness has been low; aim at recovery.
    Wellness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Complete,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: u64,
    pub source: GoalSource,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub progress: f32,
    pub status: GoalStatus,
    /// Source-specific bookkeeping (e.g. drawings counted so far).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Inputs the progress check needs from the rest of the system.
#[derive(Debug, Clone, Default)]
pub struct GoalContext {
    /// Drawings completed since the last check.
    pub drawings_completed: u32,
    pub wellness: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalBook {
    goals: Vec<Goal>,
    next_id: u64,
}

impl GoalBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Goal] {
        &self.goals
    }

    pub fn active(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    fn has_active_source(&self, source: &GoalSource) -> bool {
        self.active().any(|g| {
            std::mem::discriminant(&g.source) == std::mem::discriminant(source)
        })
    }

    fn add(&mut self, goal: Goal) -> u64 {
        let id = goal.id;
        self.goals.push(goal);
        // Bound total book size; finished goals age out first.
        if self.goals.len() > 100 {
            if let Some(idx) = self
                .goals
                .iter()
                .position(|g| g.status != GoalStatus::Active)
            {
                self.goals.remove(idx);
            }
        }
        id
    }

    fn mint(&mut self, source: GoalSource, description: String, now: DateTime<Utc>, target_days: i64) -> u64 {
        self.next_id += 1;
        let goal = Goal {
            id: self.next_id,
            source,
            description,
            created_at: now,
            target_date: Some(now + Duration::days(target_days)),
            progress: 0.0,
            status: GoalStatus::Active,
            metadata: serde_json::json!({}),
        };
        self.add(goal)
    }

    /// Suggest at most one new goal. Priority: wellness, strong
    /// preferences, recurring curiosity, belief tests, milestones.
    pub fn suggest(
        &mut self,
        now: DateTime<Utc>,
        prefs: &Preferences,
        self_model: &SelfModel,
        journal: &Journal,
        wellness: f32,
        awakenings: i64,
    ) -> Option<u64> {
        if self.active_count() >= MAX_ACTIVE_GOALS {
            return None;
        }

        if wellness < LOW_WELLNESS && !self.has_active_source(&GoalSource::Wellness) {
            return Some(self.mint(
                GoalSource::Wellness,
                "return to comfortable ranges across all dimensions".to_string(),
                now,
                3,
            ));
        }

        if let Some(cat) = prefs
            .categories()
            .find(|c| c.confidence > STRONG_PREF_CONFIDENCE && c.polarity > 0.5)
        {
            let source = GoalSource::Preference {
                category: cat.category.clone(),
            };
            if !self.has_active_source(&source) {
                let description = format!("spend more time on {}", cat.category);
                return Some(self.mint(source, description, now, 7));
            }
        }

        if let Some(q) = journal
            .open_questions()
            .find(|q| q.asked_count >= RECURRING_QUESTION_COUNT)
        {
            let source = GoalSource::Curiosity { question_id: q.id };
            if !self.has_active_source(&source) {
                let description = format!("find an answer to: {}", q.text);
                return Some(self.mint(source, description, now, 14));
            }
        }

        if let Some(belief) = self_model
            .belief_summary()
            .into_iter()
            .find(|b| b.confidence > 0.05 && b.confidence < TESTABLE_BELIEF_CONFIDENCE)
        {
            let source = GoalSource::BeliefTest {
                belief_id: belief.id.clone(),
            };
            if !self.has_active_source(&source) {
                let description = format!("gather evidence about {}", belief.id);
                return Some(self.mint(source, description, now, 7));
            }
        }

        if awakenings > 0 && awakenings % 100 == 0 && !self.has_active_source(&GoalSource::Milestone) {
            let description = format!("mark the {}th awakening with a drawing", awakenings);
            return Some(self.mint(GoalSource::Milestone, description, now, 2));
        }

        None
    }

    /// Advance progress per source, complete and abandon as due, and
    /// return goals completed this check (callers record memories).
    pub fn check(
        &mut self,
        now: DateTime<Utc>,
        ctx: &GoalContext,
        self_model: &SelfModel,
        journal: &Journal,
    ) -> Vec<Goal> {
        let mut completed = Vec::new();
        for goal in &mut self.goals {
            if goal.status != GoalStatus::Active {
                continue;
            }

            match &goal.source {
                GoalSource::Preference { category } if category == "drawing" => {
                    if ctx.drawings_completed > 0 {
                        let done = goal.metadata.get("drawings").and_then(|v| v.as_u64()).unwrap_or(0)
                            + ctx.drawings_completed as u64;
                        goal.metadata = serde_json::json!({ "drawings": done });
                        goal.progress = (done as f32 / 3.0).min(1.0);
                    }
                }
                GoalSource::Preference { .. } => {
                    // Generic preference goals creep with wellness.
                    if ctx.wellness > 0.6 {
                        goal.progress = (goal.progress + 0.05).min(1.0);
                    }
                }
                GoalSource::Curiosity { question_id } => {
                    if journal
                        .question(*question_id)
                        .map(|q| q.answer.is_some())
                        .unwrap_or(false)
                    {
                        goal.progress = 1.0;
                    }
                }
                GoalSource::Milestone => {
                    if ctx.drawings_completed > 0 {
                        goal.progress = 1.0;
                    }
                }
                GoalSource::BeliefTest { belief_id } => {
                    if let Some(belief) = self_model.belief(belief_id) {
                        if belief.confidence >= BELIEF_TEST_COMPLETE_HIGH
                            || belief.confidence <= BELIEF_TEST_COMPLETE_LOW
                        {
                            goal.progress = 1.0;
                        } else {
                            goal.progress = goal.progress.max(belief.confidence);
                        }
                    }
                }
                GoalSource::Wellness => {
                    if ctx.wellness > 0.65 {
                        goal.progress = 1.0;
                    }
                }
            }

            if goal.progress >= 1.0 {
                goal.status = GoalStatus::Complete;
                completed.push(goal.clone());
                continue;
            }

            // Stale: past target with nothing to show.
            if let Some(target) = goal.target_date {
                if now > target && goal.progress < STALE_PROGRESS {
                    goal.status = GoalStatus::Abandoned;
                    tracing::debug!(goal = %goal.description, "Goal abandoned as stale");
                }
            }
        }
        completed
    }
}
