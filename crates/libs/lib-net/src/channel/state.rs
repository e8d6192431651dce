use std::fmt;

/// Lifecycle of the single live socket.
///
/// ```text
/// Idle ─► Connecting ─► Open ─► Closing ─► Closed ─► ReconnectPending ─► Connecting
///              │                              ▲
///              └──────── connect failed ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    Connecting,
    Open,
    /// The server asked to close; the socket is shutting down.
    Closing,
    Closed,
    /// Waiting on the reconnect timer.
    ReconnectPending,
}

impl ConnectionState {
    /// A socket exists or is being established.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::ReconnectPending => "reconnect_pending",
        };
        f.write_str(name)
    }
}

/// Why an open socket went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` or `teardown()` was called.
    ClientInitiated,
    /// The server sent a close frame or ended the stream.
    ServerClosed { code: Option<u16>, reason: String },
    /// The socket failed while open.
    TransportError(String),
}

impl DisconnectReason {
    /// Whether automatic reconnection applies.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, DisconnectReason::ClientInitiated)
    }
}
