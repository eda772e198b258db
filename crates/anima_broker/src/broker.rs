//! The broker: exclusive owner of the hardware, running the 2 s loop.
//!
//! Tick order: heartbeat → carry known LED brightness → sensor read →
//! world light → neural bands → sense anima (drifted midpoints) →
//! activity → tension/agency → outputs (face, LEDs, drawing) → growth
//! updates → state recording → periodic drift/trajectory → snapshot
//! write. A single failing component degrades its subsystem and the tick
//! proceeds; only bus contention at startup is fatal.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anima_body::{FaceRenderer, JoystickSample, Lighthouse, Navigator, Screen};
use anima_core::shm::{LearningSnapshot, SharedSnapshot, SnapshotData};
use anima_core::{
    ActivityState, Anima, AnimaConfig, AnimaError, CalibrationHandle, ControlChannel,
    DisplayCommand, HealthRegistry, SensorReadings, SharedMemory, SubsystemStatus,
};
use anima_drawing::{DrawFrame, DrawingEngine};
use anima_growth::{trajectory_health, Learner, MetaWeighting, Preferences, SelfModel};
use anima_identity::{Identity, IdentityStore};
use anima_sense::{
    sense_self, Action, ActivityManager, Agency, AnimaHistory, DriftField, ValueTension,
    BASIN_WINDOW,
};
use anima_sensors::{blend_creative, derive_bands, SensorBackend, WorldLight};

/// Sensor failures sustained past this many ticks degrade health.
const SENSOR_FAILURE_TICKS: u32 = 5;
/// Recent wellness window for the broker-side health estimate.
const WELLNESS_WINDOW: usize = 30;
/// Meta-weighting samples accumulate on this tick cadence (~24 min).
const META_SAMPLE_TICKS: u64 = 720;
/// The weighting update itself runs daily.
const META_REWEIGH_TICKS: u64 = 43_200;

/// Exit code when another broker already owns the hardware.
pub const EXIT_BUS_CONTENTION: i32 = 2;

pub struct Broker {
    config: AnimaConfig,
    sensors: Box<dyn SensorBackend>,
    world_light: WorldLight,
    calibration: CalibrationHandle,
    drift: DriftField,
    activity: ActivityManager,
    agency: Agency,
    tension: ValueTension,
    history: AnimaHistory,
    self_model: SelfModel,
    preferences: Preferences,
    meta: MetaWeighting,
    store: IdentityStore,
    identity: Identity,
    lighthouse: Lighthouse,
    face: FaceRenderer,
    navigator: Navigator,
    drawing: DrawingEngine,
    shm: SharedMemory,
    control: ControlChannel,
    health: HealthRegistry,
    tick_count: u64,
    skip_outputs: bool,
    sensor_failure_streak: u32,
    /// Action taken last tick and the raw anima before it, for the
    /// volitional boundary comparison.
    pending_action: Option<(Action, Anima)>,
    recent_wellness: VecDeque<f32>,
    drew_last_tick: bool,
    drawings_dir: PathBuf,
}

impl Broker {
    /// Construct and run startup checks. Fails with `BusContention` if
    /// another broker's heartbeat is fresh.
    pub async fn start(
        config: AnimaConfig,
        sensors: Box<dyn SensorBackend>,
    ) -> Result<Self> {
        let now = Utc::now();
        let shm = SharedMemory::new(config.shm_path());
        if shm.broker_running(now) {
            return Err(AnimaError::BusContention)
                .context("another broker owns the hardware (fresh shared-memory heartbeat)");
        }

        let store = IdentityStore::open(config.db_path())
            .await
            .context("open identity store")?;
        let identity = store
            .begin_session(now.timestamp(), config.creature_id)
            .await
            .context("begin session")?;
        tracing::info!(
            name = %identity.name,
            awakenings = identity.awakenings,
            "Awake"
        );

        let calibration = CalibrationHandle::new(config.calibration.clone());
        let history = AnimaHistory::load_or_default(&config.history_path());
        let mut drift = DriftField::load_or_default(&config.drift_path());
        // A long sleep decays the midpoints toward the last healthy ones;
        // the last recorded anima point marks when the creature last ran.
        let gap = history
            .latest()
            .map(|p| now.timestamp() - p.at)
            .unwrap_or(0);
        drift.apply_gap(gap);
        let preferences = Preferences::load_or_default(&config.preferences_path());

        let mut drawing = DrawingEngine::new();
        drawing.load_canvas(&config.canvas_path());

        let health = HealthRegistry::new();
        health.register("broker", None, None);
        health.register("sensors", None, None);
        health.register("anima", None, None);
        health.register("leds", None, None);
        health.register("drawing", None, None);
        health.register("growth", Some(anima_core::health::SLOW_STALE_SECONDS), None);

        let lighthouse = Lighthouse::new(
            config.led.default_brightness,
            config.led.max_brightness,
        );
        let world_light = WorldLight::new(
            config.led.lux_per_brightness,
            config.led.glow_floor_lux,
        );
        let control = ControlChannel::new(config.control_path());
        let drawings_dir = config.drawings_dir();

        Ok(Self {
            sensors,
            world_light,
            calibration,
            drift,
            activity: ActivityManager::new(now),
            agency: Agency::new(),
            tension: ValueTension::new(),
            history,
            self_model: SelfModel::new(),
            preferences,
            meta: MetaWeighting::new(),
            store,
            identity,
            lighthouse,
            face: FaceRenderer::new(),
            navigator: Navigator::new(now),
            drawing,
            shm,
            control,
            health,
            tick_count: 0,
            skip_outputs: false,
            sensor_failure_streak: 0,
            pending_action: None,
            recent_wellness: VecDeque::with_capacity(WELLNESS_WINDOW),
            drew_last_tick: false,
            drawings_dir,
            config,
        })
    }

    /// Run the loop until ctrl-c, then persist and shut down cleanly.
    pub async fn run(mut self) -> Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.broker.tick_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let started = Instant::now();
                    if let Err(e) = self.tick().await {
                        // Never abort the loop on a tick failure.
                        tracing::error!("Tick failed: {:#}", e);
                        self.health.mark_degraded("broker");
                    }
                    let elapsed = started.elapsed();
                    self.skip_outputs =
                        elapsed > Duration::from_millis(self.config.broker.backpressure_ms);
                    if self.skip_outputs {
                        tracing::warn!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Tick overran; skipping outputs next tick"
                        );
                        self.health.mark_degraded("anima");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal, going to sleep");
                    break;
                }
            }
        }

        self.sleep().await
    }

    /// Persist everything owned by the broker and close the store.
    async fn sleep(self) -> Result<()> {
        let persist = || -> Result<(), AnimaError> {
            self.drift.save(&self.config.drift_path())?;
            self.history.save(&self.config.history_path())?;
            self.preferences.save(&self.config.preferences_path())?;
            self.drawing.save_canvas(&self.config.canvas_path())?;
            Ok(())
        };
        // One retry, then give up with a log (persistence error policy).
        if let Err(first) = persist() {
            tracing::warn!("Sleep persistence failed once: {}", first);
            if let Err(second) = persist() {
                tracing::error!("Sleep persistence failed twice, dropping: {}", second);
            }
        }
        self.store.close().await;
        Ok(())
    }

    pub async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_s = now.timestamp();
        self.tick_count += 1;
        self.health.heartbeat("broker", now_s);

        // Display actuation requests from the server.
        if let Some(command) = self.control.consume(now) {
            self.apply_control(command, now);
        }

        // 1. Carry the stable manual brightness into proprioception.
        let known_brightness = self.lighthouse.known_brightness();

        // 2. Sensor read (bounded at 1 s by the backend).
        let mut readings = self.sensors.read().await;
        self.track_sensor_failures(&readings, now_s);
        readings.led_brightness = Some(known_brightness);

        // 3. World light: LED-corrected, smoothed.
        if let Some(raw_lux) = readings.light_lux {
            readings.world_light_lux =
                Some(self.world_light.update(raw_lux, known_brightness));
        }
        let world_light = readings.world_light_lux.unwrap_or(0.0);

        // 4. Neural bands, creative-blended while drawing.
        let mut bands = derive_bands(&readings);
        if self.drew_last_tick {
            bands = blend_creative(&bands, &self.drawing.creative_bands());
        }
        readings.bands = Some(bands);

        // 5. Anima.
        let calibration = self.calibration.load();
        let trend = self.activity.interaction_trend(now);
        let sensed = sense_self(
            &readings,
            &calibration,
            Some(&self.drift.midpoints()),
            trend,
        );
        self.health.heartbeat("anima", now_s);

        // 6. Activity.
        let activity = self.activity.update(now, world_light);

        // 7. Value tension on raw anima; volitional check across the
        // action boundary from last tick.
        if let Some((action, before)) = self.pending_action.take() {
            self.tension.observe_action(before, sensed.raw, action, now_s);
        }
        self.tension.observe(sensed.raw, now_s);

        // 8. Agency: reinforce last action on current satisfaction, pick
        // the next one under conflict discounting.
        let wellness = self.preferences.wellness(&sensed.anima);
        if self.recent_wellness.len() == WELLNESS_WINDOW {
            self.recent_wellness.pop_front();
        }
        self.recent_wellness.push_back(wellness);
        self.agency.reinforce(wellness);
        let rates = self.tension.conflict_rates(|a| self.agency.uses(a));
        let action = self.agency.select_action(&rates);
        self.pending_action = Some((action, sensed.raw));
        self.apply_action(action, world_light);

        // 9. Outputs, unless backpressure told us to skip this tick.
        if self.skip_outputs {
            self.skip_outputs = false;
        } else {
            self.render_outputs(now, now_s, &sensed.anima, &activity, wellness)?;
        }

        // 10. Growth updates.
        self.self_model.observe(&sensed.raw, now_s);
        self.preferences.observe(&sensed.anima);
        self.health.heartbeat("growth", now_s);
        if self.tick_count % self.config.broker.learn_interval_ticks == 0
            || self.tick_count == 1
        {
            self.run_learning(now_s).await;
        }
        // Meta-weighting: sample on the reflection cadence, reweigh daily.
        if self.tick_count % META_SAMPLE_TICKS == 0 {
            let satisfaction = self.preferences.satisfaction(&sensed.anima);
            let health = self.broker_trajectory_health();
            self.meta.record(satisfaction, health);
        }
        if self.tick_count % META_REWEIGH_TICKS == 0 {
            self.meta.reweigh(&mut self.preferences);
            tracing::info!(weights = ?self.preferences.weights(), "Influence weights re-balanced");
        }

        // 11. Record state.
        let sensors_json = serde_json::to_string(&readings).unwrap_or_default();
        if let Err(e) = self
            .store
            .record_state(now_s, &sensed.anima, &sensors_json)
            .await
        {
            tracing::warn!("record_state failed: {}", e);
            self.health.mark_degraded("growth");
        }
        let tick_seconds = (self.config.broker.tick_ms / 1000).max(1) as i64;
        self.store.add_alive_seconds(tick_seconds).await.ok();

        // 12. Drift + trajectory cadence.
        self.history.push(now_s, &sensed.anima);
        if self.tick_count % self.config.broker.drift_interval_ticks == 0 {
            let basin = self.history.attractor_basin(BASIN_WINDOW);
            let health = self.broker_trajectory_health();
            self.drift.update(basin.mean, health);
        }

        // Health sweep, roughly once a minute.
        if self.tick_count % 30 == 0 {
            for (name, status) in self.health.status(now_s) {
                if status != SubsystemStatus::Ok {
                    tracing::warn!(subsystem = %name, status = status.as_str(), "Subsystem unwell");
                }
            }
        }

        // 13. Snapshot for the server.
        let snapshot = SharedSnapshot {
            updated_at: now,
            data: SnapshotData {
                readings,
                anima: sensed.anima,
                activity,
                learning: LearningSnapshot {
                    // Full serde forms: the server reconstructs these for
                    // goal suggestion and schema composition.
                    preferences: serde_json::to_value(&self.preferences)
                        .unwrap_or_default(),
                    self_beliefs: serde_json::to_value(&self.self_model)
                        .unwrap_or_default(),
                    agency: self.agency.snapshot(),
                },
                drawing: Some(self.drawing.eisv_trajectory()),
                governance: None,
            },
        };
        if let Err(e) = self.shm.write(&snapshot) {
            tracing::warn!("Shared-memory write failed: {}", e);
        }

        Ok(())
    }

    fn apply_control(&mut self, command: DisplayCommand, now: chrono::DateTime<Utc>) {
        self.activity.record_interaction(now);
        match command {
            DisplayCommand::ShowFace => self.navigator.switch_to(Screen::Face, now),
            DisplayCommand::SwitchScreen { screen } => {
                if let Some(screen) = Screen::parse_str(&screen) {
                    self.navigator.switch_to(screen, now);
                } else {
                    tracing::warn!(screen, "Unknown screen requested");
                }
            }
            DisplayCommand::SetBrightness { value } => {
                self.lighthouse.set_brightness(value);
            }
            DisplayCommand::SetCalibration { patch } => {
                let current = self.calibration.load();
                match current.apply_patch(&patch) {
                    Ok(next) => {
                        self.calibration.store(next.clone());
                        let mut config = self.config.clone();
                        config.calibration = next;
                        if Self::persist_config(&config).is_ok() {
                            self.config = config;
                        }
                        tracing::info!("Calibration updated by tool call");
                    }
                    Err(e) => tracing::warn!("Calibration patch rejected: {}", e),
                }
            }
        }
    }

    fn track_sensor_failures(&mut self, readings: &SensorReadings, now_s: i64) {
        // The layer is alive either way; sustained missing fields flip it
        // to degraded rather than missing.
        self.health.heartbeat("sensors", now_s);
        let expected = self.sensors.capabilities().len();
        let got = readings.available().len();
        if got + 1 < expected {
            self.sensor_failure_streak += 1;
            if self.sensor_failure_streak > SENSOR_FAILURE_TICKS {
                self.health.mark_degraded("sensors");
            }
        } else {
            self.sensor_failure_streak = 0;
        }
    }

    fn apply_action(&mut self, action: Action, world_light: f32) {
        match action {
            Action::FocusAttention => {
                self.lighthouse.set_dance(anima_body::Dance::Steady);
            }
            Action::Explore => {
                self.lighthouse.set_dance(anima_body::Dance::Sweep);
            }
            Action::Rest => {
                self.lighthouse.set_dance(anima_body::Dance::Steady);
                let toward_default = self.config.led.default_brightness;
                let current = self.lighthouse.known_brightness();
                self.lighthouse
                    .set_brightness(current + 0.25 * (toward_default - current));
            }
            Action::LedBrightness => {
                // Nudge toward visibility in the dark, down in bright rooms.
                let current = self.lighthouse.known_brightness();
                let delta = if world_light < 10.0 { 0.01 } else { -0.01 };
                self.lighthouse.set_brightness(current + delta);
            }
        }
    }

    fn render_outputs(
        &mut self,
        now: chrono::DateTime<Utc>,
        now_s: i64,
        anima: &Anima,
        activity: &ActivityState,
        wellness: f32,
    ) -> Result<()> {
        // Joystick input would arrive here from the input device; tool
        // calls come through the control channel instead.
        self.navigator.update(JoystickSample::default(), now);

        let face = self.face.render(anima, activity);
        let _ = face; // pushed to the TFT by the display backend

        self.lighthouse
            .set_distress(anima.warmth > 0.95 || anima.stability < 0.05);
        let mood_color = anima_body::mood_color(face.mood);
        if !self.lighthouse.in_distress() {
            self.lighthouse.ramp_to(mood_color, 3.0);
        }
        let tick_s = self.config.broker.tick_ms as f32 / 1000.0;
        let frame = self.lighthouse.tick(tick_s, activity.multiplier);
        debug_assert!(frame.colors.iter().all(|c| c.is_warm()));
        self.health.heartbeat("leds", now_s);

        let on_notepad = self.navigator.current() == Screen::Notepad;
        match self
            .drawing
            .tick(now_s, anima, wellness, on_notepad, &self.drawings_dir)
        {
            Ok(DrawFrame::Saved { png_path }) => {
                tracing::info!(path = %png_path.display(), "Autonomous drawing saved");
                self.drew_last_tick = true;
            }
            Ok(DrawFrame::Drew) => self.drew_last_tick = true,
            Ok(_) => self.drew_last_tick = false,
            Err(e) => {
                tracing::warn!("Drawing tick failed: {}", e);
                self.health.mark_degraded("drawing");
                self.drew_last_tick = false;
            }
        }
        self.health.heartbeat("drawing", now_s);
        Ok(())
    }

    /// Broker-side trajectory health estimate from recent wellness.
    fn broker_trajectory_health(&self) -> f32 {
        if self.recent_wellness.is_empty() {
            return 0.5;
        }
        let n = self.recent_wellness.len() as f32;
        let mean = self.recent_wellness.iter().sum::<f32>() / n;
        let var = self
            .recent_wellness
            .iter()
            .map(|w| (w - mean).powi(2))
            .sum::<f32>()
            / n;
        let efficacy = Action::ALL
            .iter()
            .map(|a| self.agency.value(*a))
            .sum::<f32>()
            / Action::ALL.len() as f32;
        trajectory_health(mean, var, efficacy, 0.0)
    }

    async fn run_learning(&mut self, now_s: i64) {
        let since = now_s - anima_growth::WINDOW_SECONDS;
        let rows = match self.store.states_since(since).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Learning query failed: {}", e);
                return;
            }
        };
        if !Learner::can_learn(rows.len()) {
            tracing::debug!(rows = rows.len(), "Not enough history to learn yet");
            return;
        }
        let observations: Vec<SensorReadings> = rows
            .iter()
            .filter_map(|r| serde_json::from_str(&r.sensors_json).ok())
            .collect();
        let current = self.calibration.load();
        if let Some(adapted) = Learner::adapt_calibration(&observations, &current) {
            tracing::info!(
                ambient_min = adapted.ambient_temp_min,
                ambient_max = adapted.ambient_temp_max,
                "Calibration adapted from experience"
            );
            self.calibration.store(adapted.clone());
            // Atomically rewrite the config so the learned ranges survive
            // restarts.
            let mut config = self.config.clone();
            config.calibration = adapted;
            if let Err(e) = Self::persist_config(&config) {
                tracing::warn!("Config rewrite failed: {}", e);
            } else {
                self.config = config;
            }
        }
    }

    fn persist_config(config: &AnimaConfig) -> Result<(), AnimaError> {
        let path = std::env::var("ANIMA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.home_dir().join("anima_config.yaml"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(config)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_sensors::MockSensors;

    fn test_config(dir: &std::path::Path) -> AnimaConfig {
        AnimaConfig {
            home: Some(dir.join("home")),
            shm_path: Some(dir.join("anima_state.json")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_startup_and_first_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut broker = Broker::start(config, Box::new(MockSensors::new()))
            .await
            .unwrap();
        assert_eq!(broker.identity().awakenings, 1);

        for _ in 0..3 {
            broker.tick().await.unwrap();
        }

        // Snapshot landed and is fresh.
        let shm = SharedMemory::new(dir.path().join("anima_state.json"));
        let (snapshot, freshness) = shm.read_fresh(Utc::now()).unwrap();
        assert_eq!(freshness, anima_core::Freshness::Fresh);
        for v in snapshot.data.anima.as_array() {
            assert!((0.0..=1.0).contains(&v));
        }
        assert!(snapshot.data.readings.bands.is_some());
        assert!(snapshot.data.readings.led_brightness.is_some());
    }

    #[tokio::test]
    async fn test_second_broker_refused() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut first = Broker::start(config.clone(), Box::new(MockSensors::new()))
            .await
            .unwrap();
        first.tick().await.unwrap();

        let second = Broker::start(config, Box::new(MockSensors::new())).await;
        assert!(second.is_err(), "second broker must refuse to start");
    }

    #[tokio::test]
    async fn test_updated_at_strictly_increases() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut broker = Broker::start(config, Box::new(MockSensors::new()))
            .await
            .unwrap();
        let shm = SharedMemory::new(dir.path().join("anima_state.json"));

        broker.tick().await.unwrap();
        let first = shm.read().unwrap().updated_at;
        tokio::time::sleep(Duration::from_millis(5)).await;
        broker.tick().await.unwrap();
        let second = shm.read().unwrap().updated_at;
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_dead_sensor_degrades_after_streak() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        // Sensors report capabilities but deliver nothing: every
        // environmental field disabled after capability registration.
        let sensors = MockSensors::new()
            .disable("ambient_temp_c")
            .disable("humidity_pct")
            .disable("pressure_hpa");
        let mut broker = Broker::start(config, Box::new(sensors)).await.unwrap();

        for _ in 0..(SENSOR_FAILURE_TICKS + 2) {
            broker.tick().await.unwrap();
        }
        let status = broker.health().status(Utc::now().timestamp());
        assert_eq!(
            status.get("sensors"),
            Some(&anima_core::SubsystemStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_control_channel_switches_screen() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let control = ControlChannel::new(config.control_path());
        let mut broker = Broker::start(config, Box::new(MockSensors::new()))
            .await
            .unwrap();

        control
            .send(
                DisplayCommand::SwitchScreen {
                    screen: "notepad".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        broker.tick().await.unwrap();
        assert_eq!(broker.navigator.current(), Screen::Notepad);

        // And the creature draws while the notepad is up.
        broker.tick().await.unwrap();
        assert!(broker.drawing.canvas().pixels_drawn() > 0);
    }

    #[tokio::test]
    async fn test_anima_always_valid_through_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut broker = Broker::start(config, Box::new(MockSensors::new()))
            .await
            .unwrap();
        let shm = SharedMemory::new(dir.path().join("anima_state.json"));
        for _ in 0..30 {
            broker.tick().await.unwrap();
            let snapshot = shm.read().unwrap();
            for v in snapshot.data.anima.as_array() {
                assert!(v.is_finite() && (0.0..=1.0).contains(&v));
            }
        }
    }
}
