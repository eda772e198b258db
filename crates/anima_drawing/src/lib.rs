//! # Anima Drawing
//!
//! The autonomous drawing engine: a 240×240 canvas, EISV-mapped coherence,
//! attention dynamics, a narrative arc, and four pluggable art eras held
//! as capability bundles in a rotating registry.

pub mod arc;
pub mod attention;
pub mod canvas;
pub mod eisv;
pub mod engine;
pub mod eras;

pub use arc::{NarrativeArc, NarrativePhase};
pub use attention::Attention;
pub use canvas::{Canvas, CANVAS_SIZE};
pub use eisv::Eisv;
pub use engine::{
    DrawFrame, DrawingEngine, DrawingState, AUTONOMY_MIN_PIXELS, AUTONOMY_WELLNESS,
    HARD_CAP_PIXELS, PAUSE_SECONDS,
};
pub use eras::{all_eras, EraOps, EraRegistry, EraState, Gesture, Intent};
