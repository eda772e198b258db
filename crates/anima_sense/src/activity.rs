//! Activity scheduling: ACTIVE / DROWSY / RESTING.
//!
//! Deterministic transitions from idle time, world light and hour of day.
//! The resulting multiplier scales brightness and expression everywhere.

use chrono::{DateTime, Timelike, Utc};

use anima_core::{ActivityLevel, ActivityState};

pub const DROWSY_IDLE_SECONDS: i64 = 30 * 60;
pub const RESTING_IDLE_SECONDS: i64 = 60 * 60;
/// Below this world light the room counts as dark.
pub const DARK_LUX: f32 = 5.0;
/// Night hours (inclusive start, exclusive end, wrapping midnight).
pub const NIGHT_START_HOUR: u32 = 22;
pub const NIGHT_END_HOUR: u32 = 6;

#[derive(Debug)]
pub struct ActivityManager {
    last_interaction: DateTime<Utc>,
    current: ActivityState,
}

impl ActivityManager {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_interaction: now,
            current: ActivityState::default(),
        }
    }

    /// Record a human interaction (joystick, button, tool call).
    pub fn record_interaction(&mut self, now: DateTime<Utc>) {
        self.last_interaction = now;
    }

    pub fn last_interaction(&self) -> DateTime<Utc> {
        self.last_interaction
    }

    /// Interaction recency as a [0, 1] trend for the presence dimension:
    /// 1.0 immediately after contact, decaying linearly to 0 over an hour.
    pub fn interaction_trend(&self, now: DateTime<Utc>) -> f32 {
        let idle_s = (now - self.last_interaction).num_seconds().max(0) as f32;
        (1.0 - idle_s / 3600.0).clamp(0.0, 1.0)
    }

    fn is_night(hour: u32) -> bool {
        hour >= NIGHT_START_HOUR || hour < NIGHT_END_HOUR
    }

    /// Advance the state machine. Pure in its inputs: idle time from the
    /// recorded interaction, the smoothed world light, and `now`'s hour.
    pub fn update(&mut self, now: DateTime<Utc>, world_light_lux: f32) -> ActivityState {
        let idle_s = (now - self.last_interaction).num_seconds().max(0);
        let dark = world_light_lux < DARK_LUX;
        let night = Self::is_night(now.hour());

        let state = if idle_s < DROWSY_IDLE_SECONDS {
            ActivityState::new(ActivityLevel::Active, "recent interaction")
        } else if idle_s >= RESTING_IDLE_SECONDS && (night || dark) {
            let reason = if night && dark {
                "long idle, night, dark room"
            } else if night {
                "long idle, night"
            } else {
                "long idle, dark room"
            };
            ActivityState::new(ActivityLevel::Resting, reason)
        } else {
            ActivityState::new(ActivityLevel::Drowsy, "idle over 30 minutes")
        };

        self.current = state.clone();
        state
    }

    pub fn current(&self) -> &ActivityState {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 23, 30, 0).unwrap()
    }

    #[test]
    fn test_recent_interaction_active() {
        let mut mgr = ActivityManager::new(noon());
        let state = mgr.update(noon() + Duration::minutes(5), 200.0);
        assert_eq!(state.level, ActivityLevel::Active);
        assert_eq!(state.multiplier, 1.0);
    }

    #[test]
    fn test_half_hour_idle_drowsy() {
        let mut mgr = ActivityManager::new(noon());
        let state = mgr.update(noon() + Duration::minutes(40), 200.0);
        assert_eq!(state.level, ActivityLevel::Drowsy);
    }

    #[test]
    fn test_hour_idle_daytime_bright_stays_drowsy() {
        let mut mgr = ActivityManager::new(noon());
        let state = mgr.update(noon() + Duration::minutes(90), 200.0);
        assert_eq!(state.level, ActivityLevel::Drowsy);
    }

    #[test]
    fn test_hour_idle_dark_room_rests() {
        let mut mgr = ActivityManager::new(noon());
        let state = mgr.update(noon() + Duration::minutes(90), 1.0);
        assert_eq!(state.level, ActivityLevel::Resting);
        assert!(state.reason.contains("dark"));
    }

    #[test]
    fn test_hour_idle_night_rests() {
        let mut mgr = ActivityManager::new(midnight() - Duration::minutes(90));
        let state = mgr.update(midnight(), 100.0);
        assert_eq!(state.level, ActivityLevel::Resting);
        assert!(state.reason.contains("night"));
    }

    #[test]
    fn test_interaction_resets_to_active() {
        let mut mgr = ActivityManager::new(noon());
        mgr.update(noon() + Duration::minutes(90), 1.0);
        mgr.record_interaction(noon() + Duration::minutes(91));
        let state = mgr.update(noon() + Duration::minutes(92), 1.0);
        assert_eq!(state.level, ActivityLevel::Active);
    }

    #[test]
    fn test_interaction_trend_decay() {
        let mgr = ActivityManager::new(noon());
        assert!((mgr.interaction_trend(noon()) - 1.0).abs() < 1e-6);
        assert!((mgr.interaction_trend(noon() + Duration::minutes(30)) - 0.5).abs() < 1e-6);
        assert_eq!(mgr.interaction_trend(noon() + Duration::hours(2)), 0.0);
    }
}
