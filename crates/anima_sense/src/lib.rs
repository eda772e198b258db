//! # Anima Sense
//!
//! The perception-to-state pipeline: weighted sensing of the four anima
//! dimensions, endogenous calibration drift, the activity state machine,
//! TD action selection with conflict discounting, value-tension detection,
//! and the rolling anima history with its attractor basin.

pub mod activity;
pub mod agency;
pub mod drift;
pub mod history;
pub mod sensing;
pub mod tension;

pub use activity::ActivityManager;
pub use agency::{Action, Agency};
pub use drift::{offset_bounds, DimDrift, DriftField, TOTAL_OFFSET_BUDGET};
pub use history::{AnimaHistory, AnimaPoint, AttractorBasin, BASIN_WINDOW, HISTORY_CAP};
pub use sensing::{sense_self, Sensed};
pub use tension::{
    ConflictCategory, ConflictEvent, ValueTension, EVENT_CAP, STRUCTURAL_PAIRS, VOLITIONAL_DELTA,
};
