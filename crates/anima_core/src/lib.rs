//! # Anima Core
//!
//! Shared data model and process plumbing for the Anima runtime:
//! the four-scalar self-state, typed sensor readings, calibration with a
//! lock-free swap handle, the shared-memory bridge between broker and
//! server, the per-subsystem health registry, and the error kinds every
//! other crate speaks.

pub mod activity;
pub mod anima;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod health;
pub mod readings;
pub mod shm;

pub use activity::{ActivityLevel, ActivityState};
pub use anima::{deserialize_safe_f32, sanitize_f32, Anima, Dimension, Mood};
pub use calibration::{
    AnimaWeights, Calibration, CalibrationHandle, CalibrationPatch, ClarityWeights,
    PresenceWeights, StabilityWeights, WarmthWeights,
};
pub use config::{AnimaConfig, BrokerConfig, LedConfig, ServerConfig};
pub use control::{ControlChannel, ControlRequest, DisplayCommand};
pub use error::AnimaError;
pub use health::{HealthRegistry, SubsystemStatus};
pub use readings::{NeuralBands, SensorReadings};
pub use shm::{
    Freshness, LearningSnapshot, SharedMemory, SharedSnapshot, SnapshotData,
    GOVERNANCE_FRESH_SECONDS, SHM_FRESH_SECONDS,
};
