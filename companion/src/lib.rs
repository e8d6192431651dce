//! # XForce Companion
//!
//! Host process for the network resilience layer: logging setup, service
//! composition and the demo wiring used by the `companion` binary.

pub mod logging;
pub mod services;
pub mod wiring;

pub use services::{Services, PREDICTIONS_TTL};
