//! The drawing engine: one gesture per broker tick while the notepad
//! screen is up.
//!
//! Delegates gesture choice to the active era, runs attention and the
//! narrative arc, and handles autonomy: when the narrative completes with
//! good wellness, enough paint down and clear sight, the canvas is saved
//! to PNG, cleared, and a 5-second pause frame is held before resuming.
//! A hard cap at 15 000 marks forces the save regardless.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anima_core::{Anima, AnimaError, NeuralBands};

use crate::arc::{NarrativeArc, NarrativePhase};
use crate::attention::Attention;
use crate::canvas::Canvas;
use crate::eisv::Eisv;
use crate::eras::{EraRegistry, EraState, Intent};

pub const AUTONOMY_WELLNESS: f32 = 0.65;
pub const AUTONOMY_MIN_PIXELS: u64 = 1000;
pub const AUTONOMY_CLARITY: f32 = 0.6;
pub const HARD_CAP_PIXELS: u64 = 15_000;
pub const PAUSE_SECONDS: i64 = 5;
const EISV_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 20;

/// What the notepad screen shows this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawFrame {
    /// A gesture was placed.
    Drew,
    /// The canvas was just saved and cleared; pause begins.
    Saved { png_path: PathBuf },
    /// Holding the post-clear pause.
    Paused { resume_in_s: i64, message: String },
    /// Not on the notepad screen.
    Idle,
}

/// Introspective snapshot for the tool surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawingState {
    pub era: String,
    pub focus: (f32, f32),
    pub pixels_drawn: u64,
    pub phase: NarrativePhase,
    pub attention: Attention,
    pub coherence: f32,
    pub coherence_velocity: f32,
    pub eisv: Eisv,
    pub drawings_completed: u32,
    pub paused: bool,
}

pub struct DrawingEngine {
    canvas: Canvas,
    registry: EraRegistry,
    era_state: EraState,
    attention: Attention,
    arc: NarrativeArc,
    last_eisv: Eisv,
    coherence: f32,
    pause_until: Option<i64>,
    drawings_completed: u32,
    drawings_since_check: u32,
    eisv_buffer: VecDeque<Eisv>,
    events: VecDeque<String>,
}

impl DrawingEngine {
    pub fn new() -> Self {
        let registry = EraRegistry::new();
        let era_state = (registry.active().create_state)();
        let canvas = Canvas::new(registry.active().name);
        Self {
            canvas,
            registry,
            era_state,
            attention: Attention::new(),
            arc: NarrativeArc::new(),
            last_eisv: Eisv {
                energy: 0.0,
                integrity: 0.0,
                entropy: 0.0,
                void: 1.0,
            },
            coherence: 0.0,
            pause_until: None,
            drawings_completed: 0,
            drawings_since_check: 0,
            eisv_buffer: VecDeque::with_capacity(EISV_BUFFER),
            events: VecDeque::with_capacity(EVENT_BUFFER),
        }
    }

    /// Restore the working canvas from its JSON snapshot.
    pub fn load_canvas(&mut self, path: &Path) {
        let canvas = Canvas::load_or_new(path, self.registry.active().name);
        // The persisted era wins; fall back to the registry default when
        // the snapshot names an unregistered era.
        if self.registry.set_active(&canvas.era().to_string()) {
            self.era_state = (self.registry.active().create_state)();
        }
        self.canvas = canvas;
    }

    pub fn save_canvas(&self, path: &Path) -> Result<(), AnimaError> {
        self.canvas.save(path)
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn set_auto_rotate(&mut self, on: bool) {
        self.registry.auto_rotate = on;
    }

    pub fn set_era(&mut self, name: &str) -> bool {
        if self.registry.set_active(name) {
            self.era_state = (self.registry.active().create_state)();
            self.canvas.set_era(name);
            true
        } else {
            false
        }
    }

    /// Drawings completed since the last goal check (drained).
    pub fn take_completed(&mut self) -> u32 {
        std::mem::take(&mut self.drawings_since_check)
    }

    /// Creative-phase neural bands for the 40/60 blend while drawing.
    pub fn creative_bands(&self) -> NeuralBands {
        let mut bands = NeuralBands {
            delta: 1.0 - self.attention.energy(),
            theta: self.attention.fatigue,
            alpha: self.coherence,
            beta: self.attention.engagement,
            gamma: self.arc.momentum(),
        };
        bands.normalize();
        bands
    }

    pub fn state(&self) -> DrawingState {
        DrawingState {
            era: self.canvas.era().to_string(),
            focus: (self.era_state.focus_x, self.era_state.focus_y),
            pixels_drawn: self.canvas.pixels_drawn(),
            phase: self.arc.phase(),
            attention: self.attention,
            coherence: self.coherence,
            coherence_velocity: self.arc.coherence_velocity(),
            eisv: self.last_eisv,
            drawings_completed: self.drawings_completed,
            paused: self.pause_until.is_some(),
        }
    }

    /// EISV trajectory for the tool surface: current shape, the rolling
    /// buffer, and recent engine events.
    pub fn eisv_trajectory(&self) -> serde_json::Value {
        serde_json::json!({
            "current": self.last_eisv,
            "coherence": self.coherence,
            "buffer": self.eisv_buffer,
            "events": self.events,
            "state": self.state(),
        })
    }

    fn push_event(&mut self, event: String) {
        if self.events.len() == EVENT_BUFFER {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// One tick of autonomous drawing.
    pub fn tick(
        &mut self,
        now: i64,
        anima: &Anima,
        wellness: f32,
        on_notepad: bool,
        drawings_dir: &Path,
    ) -> Result<DrawFrame, AnimaError> {
        if !on_notepad {
            return Ok(DrawFrame::Idle);
        }

        if let Some(until) = self.pause_until {
            if now < until {
                let resume_in_s = until - now;
                return Ok(DrawFrame::Paused {
                    resume_in_s,
                    message: format!("Canvas Cleared — Resuming in {}s…", resume_in_s),
                });
            }
            self.pause_until = None;
        }

        let intent = Intent {
            anima: *anima,
            energy: self.attention.energy(),
            phase: self.arc.phase(),
        };

        let era = *self.registry.active();
        (era.drift_focus)(&mut self.era_state, &intent);
        let gesture = (era.choose_gesture)(&mut self.era_state, &intent);
        (era.place_mark)(&mut self.canvas, &gesture);
        let intentionality = (era.intentionality)(&self.era_state);

        self.last_eisv = Eisv::measure(&self.canvas);
        self.coherence = self.last_eisv.coherence();
        if self.eisv_buffer.len() == EISV_BUFFER {
            self.eisv_buffer.pop_front();
        }
        self.eisv_buffer.push_back(self.last_eisv);

        // The arc reads last tick's attention; attention then charges the
        // gesture-switch cost if the phase just moved.
        let phase_before = self.arc.phase();
        self.arc.update(
            self.coherence,
            intentionality,
            self.canvas.pixels_drawn(),
            &self.attention,
        );
        let phase_changed = self.arc.phase() != phase_before;
        self.attention.update(
            self.coherence,
            intentionality,
            self.last_eisv.entropy,
            phase_changed,
        );

        let autonomous_save = self.arc.narrative_complete()
            && wellness > AUTONOMY_WELLNESS
            && self.canvas.pixels_drawn() >= AUTONOMY_MIN_PIXELS
            && anima.clarity > AUTONOMY_CLARITY;
        let forced_save = self.canvas.pixels_drawn() >= HARD_CAP_PIXELS;

        if autonomous_save || forced_save {
            let png_path = self.finish_drawing(now, drawings_dir, forced_save)?;
            return Ok(DrawFrame::Saved { png_path });
        }

        Ok(DrawFrame::Drew)
    }

    /// Save exactly one PNG, clear, start exactly one pause, and advance
    /// the era rotation.
    fn finish_drawing(
        &mut self,
        now: i64,
        drawings_dir: &Path,
        forced: bool,
    ) -> Result<PathBuf, AnimaError> {
        let png_path =
            drawings_dir.join(format!("drawing_{}_{}.png", now, self.canvas.era()));
        self.canvas.save_png(&png_path)?;
        self.push_event(format!(
            "{} save of {} marks ({})",
            if forced { "forced" } else { "autonomous" },
            self.canvas.pixels_drawn(),
            self.canvas.era(),
        ));

        self.canvas.clear();
        self.drawings_completed += 1;
        self.drawings_since_check += 1;
        self.arc.reset();
        self.attention = Attention::new();
        self.pause_until = Some(now + PAUSE_SECONDS);

        if self.registry.auto_rotate {
            let next = self.registry.choose_next_era();
            self.canvas.set_era(next.name);
            self.era_state = (next.create_state)();
        } else {
            self.era_state = (self.registry.active().create_state)();
        }

        tracing::info!(path = %png_path.display(), "Drawing saved, canvas cleared");
        Ok(png_path)
    }
}

impl Default for DrawingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_anima() -> Anima {
        Anima::new(0.6, 0.8, 0.6, 0.5)
    }

    #[test]
    fn test_idle_off_notepad() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        let frame = engine
            .tick(0, &clear_anima(), 0.8, false, dir.path())
            .unwrap();
        assert_eq!(frame, DrawFrame::Idle);
        assert_eq!(engine.canvas().pixels_drawn(), 0);
    }

    #[test]
    fn test_draws_on_notepad() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        for t in 0..20 {
            engine
                .tick(t, &clear_anima(), 0.8, true, dir.path())
                .unwrap();
        }
        assert!(engine.canvas().pixels_drawn() > 0);
        assert_eq!(engine.state().era, "gestural");
    }

    #[test]
    fn test_hard_cap_forces_save_and_pause() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        // Wellness too low for autonomy: only the cap can trigger a save.
        let mut saved_paths = Vec::new();
        let mut t = 0i64;
        for _ in 0..40_000 {
            match engine.tick(t, &clear_anima(), 0.1, true, dir.path()).unwrap() {
                DrawFrame::Saved { png_path } => saved_paths.push(png_path),
                DrawFrame::Paused { .. } => {}
                _ => {}
            }
            t += 2;
            if !saved_paths.is_empty() {
                break;
            }
        }
        assert_eq!(saved_paths.len(), 1, "exactly one PNG per clear");
        assert!(saved_paths[0].exists());
        assert_eq!(engine.canvas().pixels_drawn(), 0);

        // Immediately after the save, the engine holds the pause frame.
        let frame = engine.tick(t, &clear_anima(), 0.1, true, dir.path()).unwrap();
        match frame {
            DrawFrame::Paused { resume_in_s, message } => {
                assert!(resume_in_s > 0 && resume_in_s <= PAUSE_SECONDS);
                assert!(message.contains("Canvas Cleared"));
            }
            other => panic!("expected pause frame, got {:?}", other),
        }

        // After the pause expires, drawing resumes.
        let frame = engine
            .tick(t + PAUSE_SECONDS + 1, &clear_anima(), 0.1, true, dir.path())
            .unwrap();
        assert_eq!(frame, DrawFrame::Drew);
    }

    #[test]
    fn test_era_rotates_after_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        let before = engine.state().era.clone();
        let mut t = 0i64;
        loop {
            if let DrawFrame::Saved { .. } =
                engine.tick(t, &clear_anima(), 0.1, true, dir.path()).unwrap()
            {
                break;
            }
            t += 2;
        }
        assert_ne!(engine.state().era, before);
    }

    #[test]
    fn test_auto_rotate_off_keeps_era() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        engine.set_auto_rotate(false);
        let before = engine.state().era.clone();
        let mut t = 0i64;
        loop {
            if let DrawFrame::Saved { .. } =
                engine.tick(t, &clear_anima(), 0.1, true, dir.path()).unwrap()
            {
                break;
            }
            t += 2;
        }
        assert_eq!(engine.state().era, before);
    }

    #[test]
    fn test_canvas_snapshot_roundtrip_keeps_era() {
        let dir = tempfile::tempdir().unwrap();
        let canvas_path = dir.path().join("canvas.json");
        let mut engine = DrawingEngine::new();
        engine.set_era("pointillist");
        for t in 0..50 {
            engine.tick(t, &clear_anima(), 0.5, true, dir.path()).unwrap();
        }
        let marks = engine.canvas().pixels_drawn();
        engine.save_canvas(&canvas_path).unwrap();

        let mut restored = DrawingEngine::new();
        restored.load_canvas(&canvas_path);
        assert_eq!(restored.state().era, "pointillist");
        assert_eq!(restored.canvas().pixels_drawn(), marks);
    }

    #[test]
    fn test_creative_bands_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        for t in 0..30 {
            engine.tick(t, &clear_anima(), 0.5, true, dir.path()).unwrap();
        }
        let bands = engine.creative_bands();
        for v in [bands.delta, bands.theta, bands.alpha, bands.beta, bands.gamma] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_take_completed_drains() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = DrawingEngine::new();
        let mut t = 0i64;
        loop {
            if let DrawFrame::Saved { .. } =
                engine.tick(t, &clear_anima(), 0.1, true, dir.path()).unwrap()
            {
                break;
            }
            t += 2;
        }
        assert_eq!(engine.take_completed(), 1);
        assert_eq!(engine.take_completed(), 0);
    }
}
