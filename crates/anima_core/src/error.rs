//! Error kinds shared across the runtime.
//!
//! The broker tick never aborts on a single component failure; errors carry
//! a machine-readable `kind` so tool responses can surface them uniformly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnimaError {
    /// One or more sensor readings missing. Only surfaced when sustained.
    #[error("sensor failure: {0}")]
    SensorFailure(String),

    /// Hardware bus owned by another broker process. Fatal at startup.
    #[error("hardware bus owned by another process")]
    BusContention,

    /// Server-side: the broker snapshot is older than the freshness window.
    #[error("shared memory stale: last update {age_s}s ago")]
    SharedMemoryStale { age_s: i64 },

    /// Rejected at `set_calibration`; state unchanged.
    #[error("invalid calibration: {0}")]
    CalibrationInvalid(String),

    /// Persistence I/O failed after one retry.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Reflection LLM call exceeded its deadline; cadence skipped.
    #[error("llm call timed out")]
    LlmTimeout,

    /// External governance unreachable; local fallback rule applies.
    #[error("governance unreachable")]
    GovernanceUnreachable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AnimaError {
    /// Stable machine-readable kind for tool responses and health records.
    pub fn kind(&self) -> &'static str {
        match self {
            AnimaError::SensorFailure(_) => "sensor_failure",
            AnimaError::BusContention => "bus_contention",
            AnimaError::SharedMemoryStale { .. } => "shared_memory_stale",
            AnimaError::CalibrationInvalid(_) => "calibration_invalid",
            AnimaError::Persistence(_) => "persistence",
            AnimaError::LlmTimeout => "llm_timeout",
            AnimaError::GovernanceUnreachable => "governance_unreachable",
            AnimaError::Io(_) => "io",
            AnimaError::Json(_) => "json",
            AnimaError::Yaml(_) => "yaml",
        }
    }
}
