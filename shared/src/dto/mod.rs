//! # Data Transfer Objects (DTOs)
//!
//! Structures exchanged with the backend over HTTP and the live channel.
//!
//! ## Module Organization
//!
//! - [`channel`] - Envelope used for every live channel frame
//! - [`market`] - Market data payloads (prices, alerts, predictions)
//!
//! ## Example Channel Frame
//!
//! ```text
//! {
//!   "type": "price_update",
//!   "payload": { "symbol": "SOL", "price": 150.25, "timestamp": 1700000000 }
//! }
//! ```

pub mod channel;
pub mod market;

pub use channel::*;
pub use market::*;
