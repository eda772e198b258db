//! Per-subsystem heartbeat + probe registry.
//!
//! Subsystems call `heartbeat(name)` from their hot path; a periodic sweep
//! runs the registered probes. Status combines both signals:
//!
//! | heartbeat fresh | probe passes | status   |
//! |-----------------|--------------|----------|
//! | yes             | yes          | ok       |
//! | no              | yes          | stale    |
//! | yes             | no           | degraded |
//! | no              | no           | missing  |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Default heartbeat expiry. Growth/governance subsystems run on slower
/// cadences and get 90 s.
pub const DEFAULT_STALE_SECONDS: i64 = 30;
pub const SLOW_STALE_SECONDS: i64 = 90;
pub const GOVERNANCE_SHM_STALE_SECONDS: i64 = 45;

pub type Probe = Box<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemStatus {
    Ok,
    Stale,
    Degraded,
    Missing,
}

impl SubsystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemStatus::Ok => "ok",
            SubsystemStatus::Stale => "stale",
            SubsystemStatus::Degraded => "degraded",
            SubsystemStatus::Missing => "missing",
        }
    }
}

struct Entry {
    last_heartbeat: Option<i64>,
    stale_after_s: i64,
    probe: Option<Probe>,
    /// Set by owners that detect their own fault (e.g. sustained sensor
    /// failure); cleared on the next heartbeat.
    forced_degraded: bool,
}

/// Registry of subsystem health. One per process; passed explicitly to each
/// component at init rather than held in a global.
pub struct HealthRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subsystem with an optional probe and custom expiry.
    pub fn register(&self, name: &str, stale_after_s: Option<i64>, probe: Option<Probe>) {
        let mut entries = self.entries.lock().expect("health registry poisoned");
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            last_heartbeat: None,
            stale_after_s: DEFAULT_STALE_SECONDS,
            probe: None,
            forced_degraded: false,
        });
        if let Some(s) = stale_after_s {
            entry.stale_after_s = s;
        }
        if probe.is_some() {
            entry.probe = probe;
        }
    }

    /// Record a heartbeat now. Auto-registers unknown names with defaults.
    pub fn heartbeat(&self, name: &str, now: i64) {
        let mut entries = self.entries.lock().expect("health registry poisoned");
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry {
            last_heartbeat: None,
            stale_after_s: DEFAULT_STALE_SECONDS,
            probe: None,
            forced_degraded: false,
        });
        entry.last_heartbeat = Some(now);
        entry.forced_degraded = false;
    }

    /// Mark a subsystem degraded until its next heartbeat.
    pub fn mark_degraded(&self, name: &str) {
        let mut entries = self.entries.lock().expect("health registry poisoned");
        if let Some(entry) = entries.get_mut(name) {
            entry.forced_degraded = true;
        }
    }

    /// Sweep all subsystems: run probes and combine with heartbeat age.
    pub fn status(&self, now: i64) -> BTreeMap<String, SubsystemStatus> {
        let entries = self.entries.lock().expect("health registry poisoned");
        entries
            .iter()
            .map(|(name, entry)| {
                let hb_fresh = entry
                    .last_heartbeat
                    .map(|at| now - at <= entry.stale_after_s)
                    .unwrap_or(false);
                let probe_ok = !entry.forced_degraded
                    && entry.probe.as_ref().map(|p| p()).unwrap_or(true);
                let status = match (hb_fresh, probe_ok) {
                    (true, true) => SubsystemStatus::Ok,
                    (false, true) => SubsystemStatus::Stale,
                    (true, false) => SubsystemStatus::Degraded,
                    (false, false) => SubsystemStatus::Missing,
                };
                (name.clone(), status)
            })
            .collect()
    }

    pub fn status_of(&self, name: &str, now: i64) -> Option<SubsystemStatus> {
        self.status(now).get(name).copied()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_heartbeat_ok() {
        let reg = HealthRegistry::new();
        reg.heartbeat("sensors", 100);
        assert_eq!(reg.status_of("sensors", 110), Some(SubsystemStatus::Ok));
    }

    #[test]
    fn test_expired_heartbeat_stale() {
        let reg = HealthRegistry::new();
        reg.heartbeat("sensors", 100);
        assert_eq!(reg.status_of("sensors", 200), Some(SubsystemStatus::Stale));
    }

    #[test]
    fn test_probe_failure_degraded() {
        let reg = HealthRegistry::new();
        reg.register("leds", None, Some(Box::new(|| false)));
        reg.heartbeat("leds", 100);
        assert_eq!(reg.status_of("leds", 105), Some(SubsystemStatus::Degraded));
    }

    #[test]
    fn test_both_failed_missing() {
        let reg = HealthRegistry::new();
        reg.register("drawing", None, Some(Box::new(|| false)));
        assert_eq!(
            reg.status_of("drawing", 1000),
            Some(SubsystemStatus::Missing)
        );
    }

    #[test]
    fn test_slow_subsystem_window() {
        let reg = HealthRegistry::new();
        reg.register("growth", Some(SLOW_STALE_SECONDS), None);
        reg.heartbeat("growth", 100);
        // 60 s later: still within the 90 s window
        assert_eq!(reg.status_of("growth", 160), Some(SubsystemStatus::Ok));
        assert_eq!(reg.status_of("growth", 300), Some(SubsystemStatus::Stale));
    }

    #[test]
    fn test_mark_degraded_cleared_by_heartbeat() {
        let reg = HealthRegistry::new();
        reg.heartbeat("anima", 100);
        reg.mark_degraded("anima");
        assert_eq!(reg.status_of("anima", 105), Some(SubsystemStatus::Degraded));
        reg.heartbeat("anima", 106);
        assert_eq!(reg.status_of("anima", 107), Some(SubsystemStatus::Ok));
    }
}
