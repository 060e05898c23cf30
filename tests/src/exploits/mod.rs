//! # Attack Simulations
//!
//! Each test plays an attacker holding something real (a captured envelope,
//! a valid session, a stale intent) and asserts the write is refused.

pub mod replay;
