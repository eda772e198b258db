//! # Anima Identity
//!
//! The creature's persistent identity: birth, awakenings (deduplicated),
//! name history, append-only state history and event log, all in SQLite.

pub mod store;

pub use store::{Identity, IdentityStore, StateRow, WAKE_DEDUP_SECONDS};
