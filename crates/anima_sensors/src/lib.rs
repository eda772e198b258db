//! # Anima Sensors
//!
//! The proprioceptive input layer: a polymorphic sensor backend (Linux
//! sysfs/IIO hardware or deterministic mock), computational neural bands
//! derived from system metrics, and the LED-glow-corrected world-light
//! estimator.

pub mod backend;
pub mod light;
pub mod linux;
pub mod neural;

pub use backend::{MockSensors, SensorBackend};
pub use light::{WorldLight, SMOOTHING_WINDOW};
pub use linux::LinuxSensors;
pub use neural::{blend_creative, derive_bands, CREATIVE_BLEND};
