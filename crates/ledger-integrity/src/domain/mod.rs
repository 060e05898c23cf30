//! # Domain Layer
//!
//! Entities, canonical hashing and chain arithmetic with no I/O dependencies.
//! This is the inner layer of the hexagonal architecture.

pub mod canonical;
pub mod chain;
pub mod config;
pub mod errors;
pub mod intent;
pub mod keys;
pub mod ledger;
