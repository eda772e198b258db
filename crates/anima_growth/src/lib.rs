//! # Anima Growth
//!
//! The learning mind: self-beliefs with evidence tracking, preferences
//! with conserved influence weights, goals, the journal (memories,
//! questions, visitors, notes), adaptive calibration, meta-weighting, and
//! the trajectory signature that carries identity through time.

pub mod beliefs;
pub mod goals;
pub mod journal;
pub mod learning;
pub mod meta;
pub mod preferences;
pub mod trajectory;

pub use beliefs::{Episode, SelfBelief, SelfModel};
pub use goals::{Goal, GoalBook, GoalContext, GoalSource, GoalStatus, MAX_ACTIVE_GOALS};
pub use journal::{
    AgentNote, Journal, MemoryEntry, Observation, Question, VisitorRecord, OBSERVATION_CAP,
    QUESTION_CAP, VISITOR_CAP,
};
pub use learning::{Learner, BLEND_RATE, MIN_OBSERVATIONS, WINDOW_SECONDS};
pub use meta::{trajectory_health, MetaWeighting};
pub use preferences::{
    CategoryPreference, DimensionPreference, Preferences, WEIGHT_FLOOR, WEIGHT_TOTAL,
};
pub use trajectory::{TrajectoryAwareness, TrajectorySignature};
