//! # Channel Envelope
//!
//! Every frame on the live channel, inbound or outbound, is a JSON object of
//! the form `{"type": <string>, "payload": <any>}`. Routing happens on `type`
//! alone; the payload shape is owned by whoever subscribes to that type.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type for live price ticks.
pub const PRICE_UPDATE: &str = "price_update";

/// Message type for user-facing alerts pushed by the server.
pub const ALERT: &str = "alert";

/// Wire envelope for the live channel.
///
/// A missing `payload` decodes as `null`; a missing or non-string `type`
/// is a decode failure, and so is any frame that is not a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }

    /// Parse a text frame into an envelope.
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        // Derived struct impls also accept `[type, payload]` sequences.
        let value: Value = serde_json::from_str(frame)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("channel frame must be a JSON object"));
        }
        serde_json::from_value(value)
    }

    /// Serialize the envelope into a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
