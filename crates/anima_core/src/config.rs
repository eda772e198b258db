//! Runtime configuration, loaded from `anima_config.yaml`.
//!
//! Missing file or fields fall back to defaults; environment variables
//! override on top. The calibration section is the part the adaptive
//! learner atomically rewrites.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::calibration::Calibration;
use crate::error::AnimaError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimaConfig {
    /// Data directory. Defaults to `~/.anima`.
    pub home: Option<PathBuf>,
    /// Stable creature identity override (normally minted at first birth).
    pub creature_id: Option<Uuid>,
    /// tmpfs path for the broker↔server snapshot.
    pub shm_path: Option<PathBuf>,
    pub led: LedConfig,
    pub broker: BrokerConfig,
    pub server: ServerConfig,
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// Lux contributed per unit of LED brightness at the light sensor.
    pub lux_per_brightness: f32,
    /// Constant glow floor in lux when the LEDs are on at all.
    pub glow_floor_lux: f32,
    /// Manual brightness default.
    pub default_brightness: f32,
    /// Hard ceiling for manual brightness.
    pub max_brightness: f32,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            lux_per_brightness: 4000.0,
            glow_floor_lux: 8.0,
            default_brightness: 0.04,
            max_brightness: 0.12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Main loop cadence in milliseconds.
    pub tick_ms: u64,
    /// Adaptive calibration runs every this many ticks.
    pub learn_interval_ticks: u64,
    /// Drift + trajectory update cadence in ticks.
    pub drift_interval_ticks: u64,
    /// If a tick exceeds this, skip drawing and LED update next tick.
    pub backpressure_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2000,
            learn_interval_ticks: 100,
            drift_interval_ticks: 30,
            backpressure_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reflection cadence in server ticks (~24 min at 2 s).
    pub reflect_interval_ticks: u64,
    /// Goal progress check cadence (~10 min).
    pub goal_check_interval_ticks: u64,
    /// Goal suggestion cadence (~2 h).
    pub goal_suggest_interval_ticks: u64,
    /// Trajectory recompute every N composed schemas.
    pub trajectory_interval_schemas: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8990,
            reflect_interval_ticks: 720,
            goal_check_interval_ticks: 300,
            goal_suggest_interval_ticks: 3600,
            trajectory_interval_schemas: 20,
        }
    }
}

impl AnimaConfig {
    /// Load config from a YAML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnimaError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: AnimaConfig = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.calibration.validate()?;
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist or is invalid,
    /// return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!(
                    "Config {} not loaded ({}), using defaults",
                    path.as_ref().display(),
                    e
                );
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANIMA_HOME") {
            self.home = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("ANIMA_CREATURE_ID") {
            if let Ok(id) = v.parse() {
                self.creature_id = Some(id);
            }
        }
        if let Ok(v) = std::env::var("ANIMA_SHM_PATH") {
            self.shm_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("ANIMA_LED_LUX_PER_BRIGHTNESS") {
            if let Ok(n) = v.parse() {
                self.led.lux_per_brightness = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_SERVER_PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
    }

    /// Data directory, created on demand by the callers that persist.
    pub fn home_dir(&self) -> PathBuf {
        self.home.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".anima")
        })
    }

    pub fn shm_path(&self) -> PathBuf {
        self.shm_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("/dev/shm/anima_state.json"))
    }

    /// Reverse channel for display actuation, alongside the snapshot.
    pub fn control_path(&self) -> PathBuf {
        self.shm_path().with_file_name("anima_control.json")
    }

    pub fn db_path(&self) -> PathBuf {
        std::env::var("ANIMA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join("anima.db"))
    }

    pub fn history_path(&self) -> PathBuf {
        self.home_dir().join("anima_history.json")
    }

    pub fn drift_path(&self) -> PathBuf {
        self.home_dir().join("calibration_drift.json")
    }

    pub fn schema_path(&self) -> PathBuf {
        self.home_dir().join("last_schema.json")
    }

    pub fn canvas_path(&self) -> PathBuf {
        self.home_dir().join("canvas.json")
    }

    pub fn drawings_dir(&self) -> PathBuf {
        self.home_dir().join("drawings")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.home_dir().join("preferences.json")
    }

    pub fn insights_path(&self) -> PathBuf {
        self.home_dir().join("insights.json")
    }

    pub fn messages_path(&self) -> PathBuf {
        self.home_dir().join("messages.json")
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.home_dir().join("knowledge.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AnimaConfig::default();
        assert_eq!(cfg.broker.tick_ms, 2000);
        assert_eq!(cfg.led.max_brightness, 0.12);
        assert!(cfg.calibration.validate().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = AnimaConfig::load_or_default("/nonexistent/anima_config.yaml");
        assert_eq!(cfg.server.reflect_interval_ticks, 720);
    }

    #[test]
    fn test_yaml_partial_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anima_config.yaml");
        std::fs::write(
            &path,
            "led:\n  default_brightness: 0.06\ncalibration:\n  light_ref_lux: 250.0\n",
        )
        .unwrap();
        let cfg = AnimaConfig::load(&path).unwrap();
        assert!((cfg.led.default_brightness - 0.06).abs() < 1e-6);
        assert!((cfg.calibration.light_ref_lux - 250.0).abs() < 1e-6);
        // untouched fields keep defaults
        assert!((cfg.led.max_brightness - 0.12).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_calibration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anima_config.yaml");
        std::fs::write(&path, "calibration:\n  light_ref_lux: -5.0\n").unwrap();
        assert!(AnimaConfig::load(&path).is_err());
    }

    #[test]
    fn test_home_paths() {
        let cfg = AnimaConfig {
            home: Some(PathBuf::from("/tmp/creature")),
            ..Default::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/creature/anima.db"));
        assert_eq!(
            cfg.canvas_path(),
            PathBuf::from("/tmp/creature/canvas.json")
        );
    }
}
