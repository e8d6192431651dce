//! # Core Library
//!
//! Configuration and the error vocabulary shared by the request executor, the
//! cache and the live channel.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use error::{
    classify_http_status, user_message, AppError, ChannelError, FailureKind, Result, StorageError,
};
