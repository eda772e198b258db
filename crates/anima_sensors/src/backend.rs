//! Sensor backend trait and the mock implementation.
//!
//! Polymorphic over {real, mock}. `read` never blocks longer than 1 s; on
//! I/O failure fields fail individually to `None`. Exclusive bus ownership
//! belongs to the broker process.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use anima_core::SensorReadings;

/// A source of per-tick sensor snapshots.
#[async_trait]
pub trait SensorBackend: Send + Sync {
    /// Read everything this backend can provide. Individual fields fail to
    /// `None`; the call itself must complete within 1 s.
    async fn read(&self) -> SensorReadings;

    /// Field names this backend can in principle provide.
    fn capabilities(&self) -> Vec<&'static str>;

    fn name(&self) -> &'static str;
}

/// Deterministic mock backend for tests and hardware-free development.
///
/// Values wobble slowly around the configured base so downstream smoothing
/// and learning code sees realistic variation.
pub struct MockSensors {
    base: SensorReadings,
    /// Fields listed here read as `None`, simulating a dead sensor.
    disabled: Vec<&'static str>,
    tick: Mutex<u64>,
}

impl MockSensors {
    pub fn new() -> Self {
        Self {
            base: SensorReadings {
                cpu_temp_c: Some(48.0),
                ambient_temp_c: Some(21.0),
                humidity_pct: Some(42.0),
                pressure_hpa: Some(1012.0),
                light_lux: Some(180.0),
                cpu_pct: Some(18.0),
                mem_pct: Some(35.0),
                io_wait_pct: Some(1.5),
                cpu_freq_norm: Some(0.6),
                ..Default::default()
            },
            disabled: Vec::new(),
            tick: Mutex::new(0),
        }
    }

    pub fn with_base(base: SensorReadings) -> Self {
        Self {
            base,
            disabled: Vec::new(),
            tick: Mutex::new(0),
        }
    }

    /// Simulate a sensor going dark.
    pub fn disable(mut self, field: &'static str) -> Self {
        self.disabled.push(field);
        self
    }

    fn wobble(&self, tick: u64, amplitude: f32) -> f32 {
        // Slow deterministic sine so consecutive reads differ slightly.
        ((tick as f32) * 0.37).sin() * amplitude
    }
}

impl Default for MockSensors {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorBackend for MockSensors {
    async fn read(&self) -> SensorReadings {
        let tick = {
            let mut t = self.tick.lock().expect("mock tick poisoned");
            *t += 1;
            *t
        };
        let off = |name: &str| self.disabled.contains(&name);
        let w = |amp: f32| self.wobble(tick, amp);

        SensorReadings {
            cpu_temp_c: self.base.cpu_temp_c.filter(|_| !off("cpu_temp_c")).map(|v| v + w(0.8)),
            ambient_temp_c: self
                .base
                .ambient_temp_c
                .filter(|_| !off("ambient_temp_c"))
                .map(|v| v + w(0.2)),
            humidity_pct: self
                .base
                .humidity_pct
                .filter(|_| !off("humidity_pct"))
                .map(|v| v + w(1.0)),
            pressure_hpa: self
                .base
                .pressure_hpa
                .filter(|_| !off("pressure_hpa"))
                .map(|v| v + w(0.5)),
            light_lux: self
                .base
                .light_lux
                .filter(|_| !off("light_lux"))
                .map(|v| (v + w(15.0)).max(0.0)),
            cpu_pct: self
                .base
                .cpu_pct
                .filter(|_| !off("cpu_pct"))
                .map(|v| (v + w(4.0)).clamp(0.0, 100.0)),
            mem_pct: self
                .base
                .mem_pct
                .filter(|_| !off("mem_pct"))
                .map(|v| (v + w(2.0)).clamp(0.0, 100.0)),
            io_wait_pct: self
                .base
                .io_wait_pct
                .filter(|_| !off("io_wait_pct"))
                .map(|v| (v + w(0.5)).max(0.0)),
            cpu_freq_norm: self
                .base
                .cpu_freq_norm
                .filter(|_| !off("cpu_freq_norm"))
                .map(|v| (v + w(0.05)).clamp(0.0, 1.0)),
            world_light_lux: None,
            led_brightness: None,
            bands: None,
            taken_at: Utc::now().timestamp(),
        }
    }

    fn capabilities(&self) -> Vec<&'static str> {
        // Capabilities describe what is wired, not what is currently
        // healthy: a disabled field still counts, so readers can tell a
        // failing sensor from an absent one.
        vec![
            "cpu_temp_c",
            "ambient_temp_c",
            "humidity_pct",
            "pressure_hpa",
            "light_lux",
            "cpu_pct",
            "mem_pct",
            "io_wait_pct",
            "cpu_freq_norm",
        ]
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_reads_all_fields() {
        let mock = MockSensors::new();
        let r = mock.read().await;
        assert!(r.cpu_temp_c.is_some());
        assert!(r.ambient_temp_c.is_some());
        assert!(r.light_lux.is_some());
        assert!(r.taken_at > 0);
    }

    #[tokio::test]
    async fn test_disabled_field_reads_none() {
        let mock = MockSensors::new().disable("humidity_pct");
        let r = mock.read().await;
        assert!(r.humidity_pct.is_none());
        assert!(r.pressure_hpa.is_some());
        // Still a wired capability, just failing.
        assert!(mock.capabilities().contains(&"humidity_pct"));
    }

    #[tokio::test]
    async fn test_consecutive_reads_differ() {
        let mock = MockSensors::new();
        let a = mock.read().await;
        let b = mock.read().await;
        assert_ne!(a.cpu_temp_c, b.cpu_temp_c);
    }
}
