//! Art eras as capability bundles.
//!
//! An era is six pure functions over a shared [`EraState`], with no
//! inheritance and no trait objects. The registry holds the bundles as equal
//! peers and rotates on canvas clears when auto-rotate is on.

use serde::{Deserialize, Serialize};

use anima_core::Anima;

use crate::arc::NarrativePhase;
use crate::canvas::{Canvas, CANVAS_SIZE};

/// What the creature wants from the next gesture.
#[derive(Debug, Clone)]
pub struct Intent {
    pub anima: Anima,
    /// Attention energy, [0, 1].
    pub energy: f32,
    pub phase: NarrativePhase,
}

/// One gesture: where, how big, what color, how hard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    pub x: i32,
    pub y: i32,
    pub size: u32,
    pub color: [u8; 3],
    pub alpha: f32,
}

/// Shared era working state. Each era's functions interpret the fields in
/// their own idiom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraState {
    pub focus_x: f32,
    pub focus_y: f32,
    pub heading: f32,
    pub stride: f32,
    pub step: u64,
    /// How long the current motif has been sustained, [0, 1].
    pub commitment: f32,
    noise: u64,
}

impl EraState {
    fn new(seed: u64) -> Self {
        Self {
            focus_x: CANVAS_SIZE as f32 / 2.0,
            focus_y: CANVAS_SIZE as f32 / 2.0,
            heading: 0.0,
            stride: 3.0,
            step: 0,
            commitment: 0.0,
            noise: seed | 1,
        }
    }

    /// Deterministic noise in [0, 1) (xorshift64).
    pub fn next_noise(&mut self) -> f32 {
        self.noise ^= self.noise << 13;
        self.noise ^= self.noise >> 7;
        self.noise ^= self.noise << 17;
        (self.noise >> 40) as f32 / (1u64 << 24) as f32
    }

    fn wrap_focus(&mut self) {
        let max = CANVAS_SIZE as f32 - 1.0;
        self.focus_x = self.focus_x.rem_euclid(max);
        self.focus_y = self.focus_y.rem_euclid(max);
    }
}

/// The six-function capability bundle.
#[derive(Clone, Copy)]
pub struct EraOps {
    pub name: &'static str,
    pub create_state: fn() -> EraState,
    pub choose_gesture: fn(&mut EraState, &Intent) -> Gesture,
    pub place_mark: fn(&mut Canvas, &Gesture),
    pub drift_focus: fn(&mut EraState, &Intent),
    pub generate_color: fn(&mut EraState, &Intent) -> [u8; 3],
    pub intentionality: fn(&EraState) -> f32,
}

/// Warm base hue from anima: warmth pushes red, clarity pushes brightness.
fn anima_color(anima: &Anima, jitter: f32) -> [u8; 3] {
    let brightness = 0.45 + 0.5 * anima.clarity;
    let r = (255.0 * brightness).min(255.0);
    let g = (r * (0.35 + 0.3 * (1.0 - anima.warmth)) * (0.9 + 0.2 * jitter)).min(r);
    let b = (g * 0.35 * (0.8 + 0.4 * jitter)).min(g);
    [r as u8, g as u8, b as u8]
}

fn fill_block(canvas: &mut Canvas, gesture: &Gesture) {
    let half = gesture.size as i32 / 2;
    for dy in -half..=half {
        for dx in -half..=half {
            let x = gesture.x + dx;
            let y = gesture.y + dy;
            if x < 0 || y < 0 {
                continue;
            }
            if gesture.alpha >= 1.0 {
                canvas.set(x as u32, y as u32, gesture.color);
            } else {
                canvas.blend(x as u32, y as u32, gesture.color, gesture.alpha);
            }
        }
    }
}

// ============================================================================
// Gestural: continuous strokes with momentum
// ============================================================================

mod gestural {
    use super::*;

    pub fn create_state() -> EraState {
        EraState::new(0x9e3779b97f4a7c15)
    }

    pub fn drift_focus(state: &mut EraState, intent: &Intent) {
        // A stroke keeps its heading; energy widens the stride, low energy
        // lets the hand wander.
        let turn = (state.next_noise() - 0.5) * (1.2 - intent.energy);
        state.heading += turn;
        state.stride = 2.0 + 4.0 * intent.energy;
        state.focus_x += state.heading.cos() * state.stride;
        state.focus_y += state.heading.sin() * state.stride;
        state.wrap_focus();
        // Commitment builds while the heading holds.
        let steadiness = 1.0 - turn.abs().min(1.0);
        state.commitment = (state.commitment * 0.9 + 0.1 * steadiness).clamp(0.0, 1.0);
    }

    pub fn choose_gesture(state: &mut EraState, intent: &Intent) -> Gesture {
        state.step += 1;
        let size = if matches!(intent.phase, NarrativePhase::Resolving) {
            2
        } else {
            3
        };
        Gesture {
            x: state.focus_x as i32,
            y: state.focus_y as i32,
            size,
            color: generate_color(state, intent),
            alpha: 1.0,
        }
    }

    pub fn place_mark(canvas: &mut Canvas, gesture: &Gesture) {
        fill_block(canvas, gesture);
    }

    pub fn generate_color(state: &mut EraState, intent: &Intent) -> [u8; 3] {
        let jitter = state.next_noise();
        anima_color(&intent.anima, jitter)
    }

    pub fn intentionality(state: &EraState) -> f32 {
        state.commitment
    }
}

// ============================================================================
// Pointillist: scattered dots that cluster as intent firms
// ============================================================================

mod pointillist {
    use super::*;

    pub fn create_state() -> EraState {
        let mut s = EraState::new(0xd1b54a32d192ed03);
        s.stride = 30.0;
        s
    }

    pub fn drift_focus(state: &mut EraState, intent: &Intent) {
        // The cluster centre wanders slowly; scatter radius shrinks as the
        // drawing resolves.
        state.focus_x += (state.next_noise() - 0.5) * 8.0;
        state.focus_y += (state.next_noise() - 0.5) * 8.0;
        state.wrap_focus();
        let target = match intent.phase {
            NarrativePhase::Opening => 40.0,
            NarrativePhase::Developing => 24.0,
            NarrativePhase::Resolving | NarrativePhase::Closing => 10.0,
        };
        state.stride += 0.1 * (target - state.stride);
        state.commitment = (1.0 - state.stride / 40.0).clamp(0.0, 1.0);
    }

    pub fn choose_gesture(state: &mut EraState, intent: &Intent) -> Gesture {
        state.step += 1;
        let r = state.stride * state.next_noise();
        let angle = state.next_noise() * std::f32::consts::TAU;
        Gesture {
            x: (state.focus_x + r * angle.cos()) as i32,
            y: (state.focus_y + r * angle.sin()) as i32,
            size: 1,
            color: generate_color(state, intent),
            alpha: 1.0,
        }
    }

    pub fn place_mark(canvas: &mut Canvas, gesture: &Gesture) {
        fill_block(canvas, gesture);
    }

    pub fn generate_color(state: &mut EraState, intent: &Intent) -> [u8; 3] {
        let jitter = state.next_noise();
        let mut c = anima_color(&intent.anima, jitter);
        // Dots vary more in brightness than strokes do.
        let dim = 0.6 + 0.4 * state.next_noise();
        c[0] = (c[0] as f32 * dim) as u8;
        c[1] = (c[1] as f32 * dim) as u8;
        c[2] = (c[2] as f32 * dim) as u8;
        c
    }

    pub fn intentionality(state: &EraState) -> f32 {
        state.commitment
    }
}

// ============================================================================
// Field: broad soft washes
// ============================================================================

mod field {
    use super::*;

    pub fn create_state() -> EraState {
        let mut s = EraState::new(0xbf58476d1ce4e5b9);
        s.stride = 6.0;
        s
    }

    pub fn drift_focus(state: &mut EraState, _intent: &Intent) {
        // Slow scanline-like sweep; fields are patient.
        state.focus_x += state.stride;
        if state.focus_x >= CANVAS_SIZE as f32 {
            state.focus_x = 0.0;
            state.focus_y += state.stride * 2.0;
        }
        state.wrap_focus();
        state.commitment = (state.commitment + 0.01).min(0.9);
    }

    pub fn choose_gesture(state: &mut EraState, intent: &Intent) -> Gesture {
        state.step += 1;
        Gesture {
            x: state.focus_x as i32,
            y: state.focus_y as i32,
            size: 7,
            color: generate_color(state, intent),
            alpha: 0.25,
        }
    }

    pub fn place_mark(canvas: &mut Canvas, gesture: &Gesture) {
        fill_block(canvas, gesture);
    }

    pub fn generate_color(state: &mut EraState, intent: &Intent) -> [u8; 3] {
        // Nearly uniform wash; stability deepens the tone.
        let jitter = state.next_noise() * 0.2;
        let mut c = anima_color(&intent.anima, jitter);
        let depth = 0.5 + 0.5 * intent.anima.stability;
        c[0] = (c[0] as f32 * depth) as u8;
        c[1] = (c[1] as f32 * depth) as u8;
        c[2] = (c[2] as f32 * depth) as u8;
        c
    }

    pub fn intentionality(state: &EraState) -> f32 {
        state.commitment
    }
}

// ============================================================================
// Geometric: grid-locked segments
// ============================================================================

mod geometric {
    use super::*;

    const GRID: f32 = 12.0;

    pub fn create_state() -> EraState {
        let mut s = EraState::new(0x94d049bb133111eb);
        s.stride = GRID;
        s
    }

    pub fn drift_focus(state: &mut EraState, _intent: &Intent) {
        // Move one grid cell in one of four directions; prefer continuing.
        if state.next_noise() < 0.3 {
            let quarter = std::f32::consts::FRAC_PI_2;
            let turns = (state.next_noise() * 4.0).floor();
            state.heading = quarter * turns;
        }
        state.focus_x += state.heading.cos() * GRID;
        state.focus_y += state.heading.sin() * GRID;
        state.wrap_focus();
        // Snap to grid.
        state.focus_x = (state.focus_x / GRID).round() * GRID;
        state.focus_y = (state.focus_y / GRID).round() * GRID;
        state.commitment = 0.85;
    }

    pub fn choose_gesture(state: &mut EraState, intent: &Intent) -> Gesture {
        state.step += 1;
        Gesture {
            x: state.focus_x as i32,
            y: state.focus_y as i32,
            size: 5,
            color: generate_color(state, intent),
            alpha: 1.0,
        }
    }

    pub fn place_mark(canvas: &mut Canvas, gesture: &Gesture) {
        // A segment along the last heading rather than a block.
        let len = gesture.size as i32 * 2;
        for d in 0..len {
            let x = gesture.x + d;
            let y = gesture.y;
            if x >= 0 && y >= 0 {
                canvas.set(x as u32, y as u32, gesture.color);
            }
        }
    }

    pub fn generate_color(state: &mut EraState, intent: &Intent) -> [u8; 3] {
        // Two-tone palette keyed off the grid parity.
        let parity = ((state.focus_x / GRID) as i64 + (state.focus_y / GRID) as i64) % 2;
        let mut c = anima_color(&intent.anima, 0.5);
        if parity == 0 {
            c[0] = (c[0] as f32 * 0.6) as u8;
            c[1] = (c[1] as f32 * 0.6) as u8;
            c[2] = (c[2] as f32 * 0.6) as u8;
        }
        c
    }

    pub fn intentionality(state: &EraState) -> f32 {
        state.commitment
    }
}

/// All registered eras, equal peers.
pub fn all_eras() -> Vec<EraOps> {
    vec![
        EraOps {
            name: "gestural",
            create_state: gestural::create_state,
            choose_gesture: gestural::choose_gesture,
            place_mark: gestural::place_mark,
            drift_focus: gestural::drift_focus,
            generate_color: gestural::generate_color,
            intentionality: gestural::intentionality,
        },
        EraOps {
            name: "pointillist",
            create_state: pointillist::create_state,
            choose_gesture: pointillist::choose_gesture,
            place_mark: pointillist::place_mark,
            drift_focus: pointillist::drift_focus,
            generate_color: pointillist::generate_color,
            intentionality: pointillist::intentionality,
        },
        EraOps {
            name: "field",
            create_state: field::create_state,
            choose_gesture: field::choose_gesture,
            place_mark: field::place_mark,
            drift_focus: field::drift_focus,
            generate_color: field::generate_color,
            intentionality: field::intentionality,
        },
        EraOps {
            name: "geometric",
            create_state: geometric::create_state,
            choose_gesture: geometric::choose_gesture,
            place_mark: geometric::place_mark,
            drift_focus: geometric::drift_focus,
            generate_color: geometric::generate_color,
            intentionality: geometric::intentionality,
        },
    ]
}

/// Era registry: active era + rotation policy.
pub struct EraRegistry {
    eras: Vec<EraOps>,
    active: usize,
    pub auto_rotate: bool,
}

impl EraRegistry {
    pub fn new() -> Self {
        Self {
            eras: all_eras(),
            active: 0,
            auto_rotate: true,
        }
    }

    pub fn active(&self) -> &EraOps {
        &self.eras[self.active]
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.eras.iter().map(|e| e.name).collect()
    }

    pub fn set_active(&mut self, name: &str) -> bool {
        if let Some(idx) = self.eras.iter().position(|e| e.name == name) {
            self.active = idx;
            true
        } else {
            false
        }
    }

    /// Rotate to the next era (called on canvas clear with auto_rotate on).
    pub fn choose_next_era(&mut self) -> &EraOps {
        self.active = (self.active + 1) % self.eras.len();
        &self.eras[self.active]
    }
}

impl Default for EraRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> Intent {
        Intent {
            anima: Anima::new(0.6, 0.6, 0.6, 0.5),
            energy: 0.7,
            phase: NarrativePhase::Developing,
        }
    }

    #[test]
    fn test_registry_rotation_cycles_all() {
        let mut reg = EraRegistry::new();
        let first = reg.active().name;
        let mut seen = vec![first];
        for _ in 0..3 {
            seen.push(reg.choose_next_era().name);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4, "all four eras visited");
        assert_eq!(reg.choose_next_era().name, first);
    }

    #[test]
    fn test_set_active_by_name() {
        let mut reg = EraRegistry::new();
        assert!(reg.set_active("field"));
        assert_eq!(reg.active().name, "field");
        assert!(!reg.set_active("cubist"));
    }

    #[test]
    fn test_every_era_draws() {
        for era in all_eras() {
            let mut canvas = Canvas::new(era.name);
            let mut state = (era.create_state)();
            for _ in 0..50 {
                (era.drift_focus)(&mut state, &intent());
                let gesture = (era.choose_gesture)(&mut state, &intent());
                (era.place_mark)(&mut canvas, &gesture);
            }
            assert!(canvas.pixels_drawn() > 0, "{} drew nothing", era.name);
        }
    }

    #[test]
    fn test_intentionality_in_range() {
        for era in all_eras() {
            let mut state = (era.create_state)();
            for _ in 0..100 {
                (era.drift_focus)(&mut state, &intent());
                let v = (era.intentionality)(&state);
                assert!((0.0..=1.0).contains(&v), "{}: {}", era.name, v);
            }
        }
    }

    #[test]
    fn test_gestural_commitment_builds() {
        let era = &all_eras()[0];
        let mut state = (era.create_state)();
        let high_energy = Intent {
            energy: 1.0,
            ..intent()
        };
        for _ in 0..100 {
            (era.drift_focus)(&mut state, &high_energy);
        }
        // High energy → small turns → sustained heading → high commitment.
        assert!((era.intentionality)(&state) > 0.5);
    }

    #[test]
    fn test_noise_is_deterministic() {
        let mut a = EraState::new(42);
        let mut b = EraState::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_noise(), b.next_noise());
        }
    }

    #[test]
    fn test_colors_stay_warmish() {
        // The drawing palette follows anima warmth: red channel dominates.
        let mut state = EraState::new(7);
        for _ in 0..50 {
            let jitter = state.next_noise();
            let c = anima_color(&Anima::new(0.7, 0.5, 0.5, 0.5), jitter);
            assert!(c[0] >= c[1] && c[1] >= c[2], "{:?}", c);
        }
    }
}
