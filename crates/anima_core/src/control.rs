//! Display actuation requests from the server to the broker.
//!
//! The reverse channel of the shared-memory bridge: the server is the
//! sole writer of a small control file; the broker consumes it (reads and
//! removes) at the top of a tick. Same atomic write-and-rename discipline
//! as the snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::CalibrationPatch;
use crate::error::AnimaError;

/// Requests older than this are dropped unapplied (server restarted,
/// broker was down, etc.).
pub const CONTROL_FRESH_SECONDS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum DisplayCommand {
    ShowFace,
    SwitchScreen { screen: String },
    SetBrightness { value: f32 },
    /// Calibration update, already validated server-side; the broker
    /// re-validates against its live calibration before applying.
    SetCalibration { patch: CalibrationPatch },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub issued_at: DateTime<Utc>,
    pub command: DisplayCommand,
}

#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Server side: overwrite any pending request.
    pub fn send(&self, command: DisplayCommand, now: DateTime<Utc>) -> Result<(), AnimaError> {
        let request = ControlRequest {
            issued_at: now,
            command,
        };
        let bytes = serde_json::to_vec(&request)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Broker side: take the pending request, if fresh. The file is
    /// removed either way.
    pub fn consume(&self, now: DateTime<Utc>) -> Option<DisplayCommand> {
        let bytes = fs::read(&self.path).ok()?;
        let _ = fs::remove_file(&self.path);
        let request: ControlRequest = serde_json::from_slice(&bytes).ok()?;
        if (now - request.issued_at).num_seconds() > CONTROL_FRESH_SECONDS {
            tracing::debug!("Dropping stale display request");
            return None;
        }
        Some(request.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_send_consume_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("anima_control.json"));
        let now = Utc::now();
        channel
            .send(
                DisplayCommand::SwitchScreen {
                    screen: "notepad".to_string(),
                },
                now,
            )
            .unwrap();
        let cmd = channel.consume(now).unwrap();
        assert_eq!(
            cmd,
            DisplayCommand::SwitchScreen {
                screen: "notepad".to_string()
            }
        );
        // Consumed: second read finds nothing.
        assert!(channel.consume(now).is_none());
    }

    #[test]
    fn test_stale_request_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("anima_control.json"));
        let then = Utc::now() - Duration::seconds(120);
        channel.send(DisplayCommand::ShowFace, then).unwrap();
        assert!(channel.consume(Utc::now()).is_none());
    }

    #[test]
    fn test_empty_channel() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("anima_control.json"));
        assert!(channel.consume(Utc::now()).is_none());
    }
}
