//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that external callers use
//! - **Outbound (Driven)**: Storage and clock dependencies this subsystem needs

pub mod inbound;
pub mod outbound;
