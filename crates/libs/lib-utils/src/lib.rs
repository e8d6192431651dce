//! # Utilities Library
//!
//! Shared helpers for environment variables, wall-clock time and base64url
//! key encoding.

pub mod b64;
pub mod envs;
pub mod time;

// Re-export commonly used functions
pub use b64::{b64u_decode_to_string, b64u_encode};
pub use envs::{get_env, get_env_or, get_env_parse_or};
pub use time::{Clock, ManualClock, SystemClock};
