//! # Network Resilience Layer
//!
//! Client-side plumbing that keeps the trading companion usable on flaky
//! mobile connectivity.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    application code                      │
//! └──────────────┬──────────────────────────────┬────────────┘
//!                │ execute()                    │ subscribe()
//!                ▼                              ▼
//!   ┌─────────────────────────┐     ┌─────────────────────────┐
//!   │ RequestExecutor         │     │ ChannelManager          │
//!   │ timeout, retry/backoff, │     │ one socket, linear      │
//!   │ error classification    │     │ reconnect, routing by   │
//!   └───────────┬─────────────┘     │ message type            │
//!               │ read/write        └───────────┬─────────────┘
//!               ▼                               │
//!   ┌─────────────────────────┐                 │
//!   │ TimeBoxedCache          │                 │
//!   │ absolute-expiry entries │                 │
//!   └─────────────────────────┘                 │
//!               │ HTTP                          │ WebSocket
//!               ▼                               ▼
//!         Backend API                   Live price/event feed
//! ```
//!
//! - **[`cache`]**: [`TimeBoxedCache`] over a pluggable [`CacheStore`]
//!   (in-memory or one-file-per-record on disk)
//! - **[`executor`]**: [`RequestExecutor`] with [`RetryPolicy`] and an
//!   [`HttpTransport`] seam (reqwest in production)
//! - **[`channel`]**: [`ChannelManager`] with a [`Connector`] seam
//!   (tokio-tungstenite in production)
//! - **[`collaborators`]**: narrow interfaces to the secure credential store
//!   and the toast/alert surface
//!
//! All components are `Send + Sync` and expect to run inside a tokio runtime.

pub mod cache;
pub mod channel;
pub mod collaborators;
pub mod executor;

pub use cache::{CacheEntry, CacheStore, FileStore, MemoryStore, TimeBoxedCache, CACHE_PREFIX};
pub use channel::{
    ChannelManager, Connection, ConnectionState, Connector, DisconnectReason, FrameSink,
    InboundFrame, ReconnectPolicy, Subscription, TungsteniteConnector,
};
pub use collaborators::{LogNotifier, MemorySecureStore, Notifier, SecureStore, Severity};
pub use executor::{
    ApiRequest, CacheInvalidation, HttpTransport, Method, RawResponse, RequestExecutor,
    RequestFailure, RequestOptions, RequestOutcome, ReqwestTransport, RetryPolicy, TransportError,
};
