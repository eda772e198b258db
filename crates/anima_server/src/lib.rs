//! # Anima Server
//!
//! The query-side process: polls the broker's shared-memory snapshot,
//! composes self-schemas, runs the reflection cadences, and serves the
//! tool surface over HTTP. Holds no hardware.

pub mod reflect;
pub mod server;
pub mod state;
pub mod tools;

pub use reflect::{reflect, InjectionStrength, Insight, Insights, Metacognition};
pub use server::{router, serve};
pub use state::{run_orchestrator, AppState, ServerMind};
pub use tools::{dispatch, ToolError, ToolResult, TOOL_NAMES};
