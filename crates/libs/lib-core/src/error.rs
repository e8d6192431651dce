//! # Centralized Error Handling
//!
//! This module defines the failure vocabulary shared by every network-facing
//! component of the companion: the request executor, the time-boxed cache and
//! the live channel. It follows the `thiserror` pattern for ergonomic error
//! handling.
//!
//! ## Failure Taxonomy
//!
//! [`FailureKind`] classifies *why* something failed, independent of which
//! Rust error carried it:
//!
//! 1. **Retryable** - transient conditions worth another attempt
//!    - [`Timeout`](FailureKind::Timeout) - per-attempt deadline elapsed
//!    - [`NetworkUnreachable`](FailureKind::NetworkUnreachable) - DNS, offline, reset
//!    - [`ServerError`](FailureKind::ServerError) - 5xx response
//!
//! 2. **Terminal** - retrying cannot help
//!    - [`ClientError`](FailureKind::ClientError) - 4xx response
//!    - [`DecodeError`](FailureKind::DecodeError) - body or frame did not parse
//!    - [`StorageError`](FailureKind::StorageError) - local backing store failed
//!
//! ## User Messages
//!
//! [`user_message()`] maps a classification to one fixed, human-readable
//! string. Raw transport text never reaches the user.
//!
//! ```rust
//! use lib_core::error::{classify_http_status, user_message, FailureKind};
//!
//! let kind = classify_http_status(503).unwrap();
//! assert_eq!(kind, FailureKind::ServerError);
//! assert!(kind.is_retryable());
//! assert_eq!(
//!     user_message(kind, Some(503)),
//!     "The server ran into a problem. Please try again later."
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Classification of a failed request, frame or storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The per-attempt deadline elapsed before a response arrived.
    Timeout,
    /// The transport could not establish or keep a connection.
    NetworkUnreachable,
    /// The server answered with a 5xx status.
    ServerError,
    /// The server answered with a 4xx status.
    ClientError,
    /// A response body or channel frame could not be parsed.
    DecodeError,
    /// The cache's backing store failed.
    StorageError,
}

impl FailureKind {
    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::NetworkUnreachable | FailureKind::ServerError
        )
    }

    /// Stable machine-readable code, used in logs.
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::NetworkUnreachable => "network_unreachable",
            FailureKind::ServerError => "server_error",
            FailureKind::ClientError => "client_error",
            FailureKind::DecodeError => "decode_error",
            FailureKind::StorageError => "storage_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Map an HTTP status code to a failure classification.
///
/// Returns `None` for 2xx. Any other non-2xx status outside 4xx is treated as
/// a server-side problem.
pub fn classify_http_status(status: u16) -> Option<FailureKind> {
    match status {
        200..=299 => None,
        400..=499 => Some(FailureKind::ClientError),
        _ => Some(FailureKind::ServerError),
    }
}

/// Fixed user-facing text for a terminal failure.
///
/// The status only refines client errors (authorization vs. not found vs.
/// everything else); the result never depends on request content.
pub fn user_message(kind: FailureKind, status: Option<u16>) -> &'static str {
    match kind {
        FailureKind::Timeout => "The request timed out. Please try again.",
        FailureKind::NetworkUnreachable => {
            "No internet connection. Check your network and try again."
        }
        FailureKind::ServerError => "The server ran into a problem. Please try again later.",
        FailureKind::ClientError => match status {
            Some(401) | Some(403) => "You are not authorized. Please sign in again.",
            Some(404) => "The requested data could not be found.",
            _ => "The request could not be processed.",
        },
        FailureKind::DecodeError => "Received an unexpected response from the server.",
        FailureKind::StorageError => "Local storage is unavailable.",
    }
}

/// Failure of the cache's backing store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system failure (file-backed store).
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized or deserialized.
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::StorageError
    }
}

/// Failure reported by the live channel through its error observers.
///
/// The channel never returns these from its event handling; they are only
/// delivered to `on_error` observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Opening the socket failed (DNS, refused, handshake, timeout).
    #[error("Channel connect error: {0}")]
    Connect(String),

    /// The socket failed while open.
    #[error("Channel transport error: {0}")]
    Transport(String),

    /// An inbound frame did not decode into a `{type, payload}` envelope.
    #[error("Channel decode error: {0}")]
    Decode(String),

    /// A subscriber handler panicked while handling a message.
    #[error("Handler for '{message_type}' panicked: {message}")]
    Handler {
        message_type: String,
        message: String,
    },

    /// Automatic reconnection gave up.
    #[error("Channel reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl ChannelError {
    /// Classification in the shared failure vocabulary.
    pub fn kind(&self) -> FailureKind {
        match self {
            ChannelError::Connect(_)
            | ChannelError::Transport(_)
            | ChannelError::ReconnectExhausted { .. } => FailureKind::NetworkUnreachable,
            ChannelError::Decode(_) | ChannelError::Handler { .. } => FailureKind::DecodeError,
        }
    }
}

/// Application-wide error type for setup and composition.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error during startup or environment loading.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl From<lib_utils::envs::Error> for AppError {
    fn from(err: lib_utils::envs::Error) -> Self {
        match err {
            lib_utils::envs::Error::MissingEnv(name) => {
                AppError::Config(format!("{name} must be set in environment"))
            }
            lib_utils::envs::Error::WrongFormat(name) => {
                AppError::Config(format!("{name} has an invalid value"))
            }
        }
    }
}
