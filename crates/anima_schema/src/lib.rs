//! # Anima Schema
//!
//! The schema hub: a typed node/edge graph of the creature's current
//! self-understanding, enriched with identity meta-nodes, gap texture
//! after time lost, and periodic trajectory feedback.

pub mod hub;

pub use hub::{
    BeliefFact, ComposeInputs, GapDelta, IdentityFacts, NodeKind, PrefFact, SchemaEdge,
    SchemaHub, SchemaNode, SelfSchema, GAP_THRESHOLD_SECONDS, HISTORY_CAP,
    TRAJECTORY_INTERVAL,
};
