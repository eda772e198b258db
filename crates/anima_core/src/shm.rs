//! Shared-memory bridge between the broker and server processes.
//!
//! A single JSON document at a tmpfs path. The broker is the sole writer;
//! writes are atomic (temp file + rename). The server reads and reports
//! staleness beyond the freshness window rather than retrying hard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::activity::ActivityState;
use crate::anima::Anima;
use crate::error::AnimaError;
use crate::readings::SensorReadings;

/// Readings older than this are reported `stale` by the server.
pub const SHM_FRESH_SECONDS: i64 = 30;
/// The governance block has its own, looser staleness window.
pub const GOVERNANCE_FRESH_SECONDS: i64 = 45;
/// A second broker must exit if it sees a snapshot newer than this.
pub const BROKER_HEARTBEAT_SECONDS: i64 = 10;

/// Learning state exported for the server's reflection pipeline. Dynamic
/// JSON here: this is the serialization boundary between processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningSnapshot {
    #[serde(default)]
    pub preferences: serde_json::Value,
    #[serde(default)]
    pub self_beliefs: serde_json::Value,
    #[serde(default)]
    pub agency: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    pub readings: SensorReadings,
    pub anima: Anima,
    pub activity: ActivityState,
    pub learning: LearningSnapshot,
    /// Drawing-engine introspection (EISV shape, buffer, events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<serde_json::Value>,
}

/// The canonical shared-memory document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedSnapshot {
    pub updated_at: DateTime<Utc>,
    pub data: SnapshotData,
}

impl SharedSnapshot {
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_seconds()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age_seconds(now) <= SHM_FRESH_SECONDS
    }

    /// Governance freshness is judged by the embedded `governance_at`
    /// timestamp, falling back to the snapshot's own.
    pub fn governance_fresh(&self, now: DateTime<Utc>) -> bool {
        let Some(gov) = &self.data.governance else {
            return false;
        };
        let at = gov
            .get("governance_at")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or(self.updated_at);
        (now - at).num_seconds() <= GOVERNANCE_FRESH_SECONDS
    }
}

/// Freshness verdict returned alongside server-side reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Freshness {
    Fresh,
    Stale { age_s: i64 },
}

/// Handle on the tmpfs document.
#[derive(Debug, Clone)]
pub struct SharedMemory {
    path: PathBuf,
}

impl SharedMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic write: serialize, write to `<path>.tmp`, rename over the
    /// target. Readers never observe a torn document.
    pub fn write(&self, snapshot: &SharedSnapshot) -> Result<(), AnimaError> {
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn read(&self) -> Result<SharedSnapshot, AnimaError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read plus staleness verdict. A stale snapshot is still returned;
    /// the caller decides how to surface it.
    pub fn read_fresh(&self, now: DateTime<Utc>) -> Result<(SharedSnapshot, Freshness), AnimaError> {
        let snapshot = self.read()?;
        let age = snapshot.age_seconds(now);
        let freshness = if age <= SHM_FRESH_SECONDS {
            Freshness::Fresh
        } else {
            Freshness::Stale { age_s: age }
        };
        Ok((snapshot, freshness))
    }

    /// True if another broker wrote a snapshot within the heartbeat window.
    /// Used for the startup contention check.
    pub fn broker_running(&self, now: DateTime<Utc>) -> bool {
        match self.read() {
            Ok(snapshot) => snapshot.age_seconds(now) <= BROKER_HEARTBEAT_SECONDS,
            Err(_) => false,
        }
    }
}
