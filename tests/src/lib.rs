//! # Ledger Integrity Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Shared fixtures: service, clock, signing actors
//! ├── exploits/         # Attack simulations against the intent path
//! │   ├── replay.rs
//! │   └── impersonation.rs
//! └── integration/      # End-to-end flows through the service API
//!     ├── flows.rs
//!     ├── migration.rs
//!     └── tamper.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ledger-tests
//!
//! # By category
//! cargo test -p ledger-tests integration::
//! cargo test -p ledger-tests exploits::
//!
//! # Benchmarks
//! cargo bench -p ledger-tests
//! ```

pub mod exploits;
pub mod harness;
pub mod integration;
