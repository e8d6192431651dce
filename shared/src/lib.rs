//! # Shared Data Transfer Objects Library
//!
//! This library defines the wire contract between the companion client and the
//! trading backend. All DTOs use JSON serialization via `serde`.
//!
//! ## Structure
//!
//! - **[`dto`]**: Data Transfer Objects
//!   - **[`dto::channel`]**: The `{type, payload}` envelope carried by the live channel
//!   - **[`dto::market`]**: Price updates, alerts and predictions
//!
//! ## Wire Format
//!
//! - Field names use **snake_case** in Rust and JSON
//! - Optional fields are omitted from JSON when `None`
//! - The envelope discriminator is serialized as `"type"`
//!
//! ## Usage
//!
//! ```rust
//! use shared::dto::channel::Envelope;
//! use shared::dto::market::PriceUpdate;
//!
//! let frame = r#"{"type":"price_update","payload":{"symbol":"SOL","price":150.25,"timestamp":1700000000}}"#;
//! let envelope = Envelope::decode(frame).unwrap();
//! let update: PriceUpdate = envelope.payload_as().unwrap();
//! assert_eq!(update.symbol, "SOL");
//! ```

pub mod dto;

// Re-export commonly used types for convenience
pub use dto::*;
