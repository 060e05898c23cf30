//! # Adapters Layer
//!
//! Implementations of the outbound ports.
//! - `memory`: in-memory store for tests and offline audits
//! - `time`: system and fixed clocks
//! - `secrets`: legacy key loading

pub mod memory;
pub mod secrets;
pub mod time;

pub use memory::InMemoryLedgerStore;
pub use secrets::read_legacy_pem;
pub use time::{FixedTimeSource, SystemTimeSource};
