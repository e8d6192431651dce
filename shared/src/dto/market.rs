//! # Market Data Transfer Objects
//!
//! Payloads for price ticks, alerts and model predictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live price tick carried in a `price_update` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    /// Unix seconds
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Alert severity as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// Server-pushed alert carried in an `alert` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Direction of a predicted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// A single model prediction returned by `GET /predictions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub symbol: String,
    pub direction: Direction,
    /// Confidence in the range 0.0..=1.0
    pub confidence: f64,
    pub target_price: f64,
    pub generated_at: DateTime<Utc>,
}
