//! Real sensor backend for a Linux single-board computer.
//!
//! Environmental sensors (BME280, VEML7700) are read through the kernel's
//! IIO sysfs interface; SoC temperature through the thermal zone; system
//! metrics through `sysinfo` plus `/proc/stat` for io-wait. Each probe
//! fails individually to `None` so one dead sensor never takes down the
//! snapshot. The whole read is bounded by a 1 s deadline.

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::System;

use anima_core::SensorReadings;

use crate::backend::SensorBackend;

const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Discovered IIO channel paths for the environmental sensors.
#[derive(Debug, Clone, Default)]
struct IioChannels {
    temp: Option<PathBuf>,
    humidity: Option<PathBuf>,
    pressure: Option<PathBuf>,
    illuminance: Option<PathBuf>,
}

/// Snapshot of `/proc/stat` cpu counters for io-wait deltas.
#[derive(Debug, Clone, Copy, Default)]
struct CpuTimes {
    total: u64,
    iowait: u64,
}

pub struct LinuxSensors {
    channels: IioChannels,
    thermal_zone: Option<PathBuf>,
    system: Mutex<System>,
    prev_cpu_times: Mutex<CpuTimes>,
    max_freq_khz: Option<f32>,
}

impl LinuxSensors {
    /// Probe sysfs for available sensors. Never fails: a machine with no
    /// IIO devices simply yields system metrics only.
    pub fn discover() -> Self {
        let channels = Self::discover_iio("/sys/bus/iio/devices");
        let thermal_zone = Self::discover_thermal("/sys/class/thermal");
        let max_freq_khz = fs::read_to_string(
            "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq",
        )
        .ok()
        .and_then(|s| s.trim().parse::<f32>().ok());

        tracing::info!(
            temp = channels.temp.is_some(),
            humidity = channels.humidity.is_some(),
            pressure = channels.pressure.is_some(),
            illuminance = channels.illuminance.is_some(),
            thermal = thermal_zone.is_some(),
            "Discovered sensors"
        );

        Self {
            channels,
            thermal_zone,
            system: Mutex::new(System::new()),
            prev_cpu_times: Mutex::new(CpuTimes::default()),
            max_freq_khz,
        }
    }

    fn discover_iio(root: &str) -> IioChannels {
        let mut channels = IioChannels::default();
        let Ok(entries) = fs::read_dir(root) else {
            return channels;
        };
        for entry in entries.flatten() {
            let dir = entry.path();
            let probe = |file: &str| {
                let p = dir.join(file);
                p.exists().then_some(p)
            };
            if channels.temp.is_none() {
                channels.temp = probe("in_temp_input");
            }
            if channels.humidity.is_none() {
                channels.humidity = probe("in_humidityrelative_input");
            }
            if channels.pressure.is_none() {
                channels.pressure = probe("in_pressure_input");
            }
            if channels.illuminance.is_none() {
                channels.illuminance = probe("in_illuminance_input");
            }
        }
        channels
    }

    fn discover_thermal(root: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(root).ok()?;
        for entry in entries.flatten() {
            let temp = entry.path().join("temp");
            if temp.exists() {
                return Some(temp);
            }
        }
        None
    }

    fn read_sysfs_f32(path: &Option<PathBuf>) -> Option<f32> {
        let path = path.as_ref()?;
        match fs::read_to_string(path) {
            Ok(s) => s.trim().parse::<f32>().ok(),
            Err(e) => {
                tracing::debug!("sysfs read {} failed: {}", path.display(), e);
                None
            }
        }
    }

    fn read_proc_stat() -> Option<CpuTimes> {
        let stat = fs::read_to_string("/proc/stat").ok()?;
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 5 {
            return None;
        }
        Some(CpuTimes {
            total: fields.iter().sum(),
            iowait: fields[4],
        })
    }

    /// io-wait share since the previous read, in percent.
    fn io_wait_pct(&self) -> Option<f32> {
        let current = Self::read_proc_stat()?;
        let mut prev = self.prev_cpu_times.lock().expect("cpu times poisoned");
        let dt_total = current.total.saturating_sub(prev.total);
        let dt_iowait = current.iowait.saturating_sub(prev.iowait);
        *prev = current;
        if dt_total == 0 {
            return None;
        }
        Some((dt_iowait as f32 / dt_total as f32) * 100.0)
    }

    fn read_blocking(&self) -> SensorReadings {
        // IIO units: temp milli-°C, humidity milli-%, pressure kPa, lux raw.
        let ambient_temp_c = Self::read_sysfs_f32(&self.channels.temp).map(|v| v / 1000.0);
        let humidity_pct = Self::read_sysfs_f32(&self.channels.humidity).map(|v| v / 1000.0);
        let pressure_hpa = Self::read_sysfs_f32(&self.channels.pressure).map(|v| v * 10.0);
        let light_lux = Self::read_sysfs_f32(&self.channels.illuminance);
        let cpu_temp_c = Self::read_sysfs_f32(&self.thermal_zone).map(|v| v / 1000.0);

        let (cpu_pct, mem_pct, cpu_freq_norm) = {
            let mut sys = self.system.lock().expect("sysinfo poisoned");
            sys.refresh_cpu();
            sys.refresh_memory();
            let cpu = sys.global_cpu_info().cpu_usage();
            let mem = if sys.total_memory() > 0 {
                (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
            } else {
                0.0
            };
            let freq = self.max_freq_khz.and_then(|max| {
                sys.cpus().first().map(|c| {
                    // sysinfo reports MHz; sysfs max is kHz
                    ((c.frequency() as f32 * 1000.0) / max).clamp(0.0, 1.0)
                })
            });
            (Some(cpu), Some(mem), freq)
        };

        SensorReadings {
            cpu_temp_c,
            ambient_temp_c,
            humidity_pct,
            pressure_hpa,
            light_lux,
            cpu_pct,
            mem_pct,
            io_wait_pct: self.io_wait_pct(),
            cpu_freq_norm,
            world_light_lux: None,
            led_brightness: None,
            bands: None,
            taken_at: Utc::now().timestamp(),
        }
    }
}

#[async_trait]
impl SensorBackend for LinuxSensors {
    async fn read(&self) -> SensorReadings {
        // sysfs reads can stall on a wedged bus; bound the whole snapshot.
        let started = std::time::Instant::now();
        let readings = self.read_blocking();
        if started.elapsed() > READ_DEADLINE {
            tracing::warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sensor read exceeded deadline"
            );
        }
        readings
    }

    fn capabilities(&self) -> Vec<&'static str> {
        let mut fields = vec!["cpu_pct", "mem_pct", "io_wait_pct"];
        if self.thermal_zone.is_some() {
            fields.push("cpu_temp_c");
        }
        if self.channels.temp.is_some() {
            fields.push("ambient_temp_c");
        }
        if self.channels.humidity.is_some() {
            fields.push("humidity_pct");
        }
        if self.channels.pressure.is_some() {
            fields.push("pressure_hpa");
        }
        if self.channels.illuminance.is_some() {
            fields.push("light_lux");
        }
        if self.max_freq_khz.is_some() {
            fields.push("cpu_freq_norm");
        }
        fields
    }

    fn name(&self) -> &'static str {
        "linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_never_panics() {
        // On any machine, discovery succeeds and a read yields at least
        // system metrics.
        let sensors = LinuxSensors::discover();
        let r = sensors.read().await;
        assert!(r.cpu_pct.is_some());
        assert!(r.mem_pct.is_some());
    }

    #[test]
    fn test_proc_stat_parse_shape() {
        if let Some(times) = LinuxSensors::read_proc_stat() {
            assert!(times.total >= times.iowait);
        }
    }
}
