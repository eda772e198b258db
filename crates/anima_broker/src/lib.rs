//! # Anima Broker
//!
//! The hardware-owning process: the 2 s tick loop that senses, feels,
//! expresses, learns, records and publishes the shared-memory snapshot.

pub mod broker;

pub use broker::{Broker, EXIT_BUS_CONTENTION};
