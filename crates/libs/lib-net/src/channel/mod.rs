//! # Live Channel Manager
//!
//! Keeps one long-lived duplex socket to the backend alive and routes inbound
//! `{type, payload}` envelopes to subscribers.
//!
//! ## Behavior
//!
//! - At most one socket. [`ChannelManager::connect`] is a no-op while
//!   connecting or open.
//! - Unexpected closes (server close, transport error, failed connect) schedule
//!   a reconnect after `interval × attempt`. A successful open resets the
//!   counter. Hitting the cap reports [`ChannelError::ReconnectExhausted`].
//! - [`ChannelManager::disconnect`] cancels any pending reconnect before it
//!   returns.
//! - Subscriptions survive reconnects. Frames that fail to decode go to
//!   `on_error` observers, never to handlers. A panicking handler is reported
//!   and the remaining handlers still run.
//!
//! Every socket gets a generation number. Tasks belonging to a superseded
//! socket check it before touching shared state and bail out if it moved on.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lib_net::{ChannelManager, ReconnectPolicy, TungsteniteConnector};
//! use shared::PriceUpdate;
//!
//! # async fn demo() {
//! let connector = TungsteniteConnector::new("ws://127.0.0.1:3001/api/ws", Duration::from_secs(10));
//! let channel = ChannelManager::new(Arc::new(connector), ReconnectPolicy::default());
//!
//! let _prices = channel.subscribe_as::<PriceUpdate, _>("price_update", |tick| {
//!     println!("{} = {}", tick.symbol, tick.price);
//! });
//! channel.connect();
//! # }
//! ```

mod connector;
mod reconnect;
mod registry;
mod state;

#[cfg(test)]
mod tests;

pub use connector::{Connection, Connector, FrameSink, InboundFrame, TungsteniteConnector};
pub use reconnect::ReconnectPolicy;
pub use registry::{Handler, Subscription};
pub use state::{ConnectionState, DisconnectReason};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lib_core::ChannelError;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::Envelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use registry::SubscriberRegistry;

type ConnectObserver = Arc<dyn Fn() + Send + Sync>;
type DisconnectObserver = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&ChannelError) + Send + Sync>;

#[derive(Default)]
struct Observers {
    connect: Vec<ConnectObserver>,
    disconnect: Vec<DisconnectObserver>,
    error: Vec<ErrorObserver>,
}

/// Commands from the manager to the socket task.
enum Outbound {
    Text(String),
    Close,
}

/// Mutable connection bookkeeping. Guarded by one short lock.
struct Link {
    state: ConnectionState,
    generation: u64,
    /// Consecutive reconnects scheduled since the last successful open.
    attempts: u32,
    caller_closed: bool,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl Link {
    fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            generation: 0,
            attempts: 0,
            caller_closed: false,
            outbound: None,
            reconnect_timer: None,
        }
    }

    /// Start a new socket generation in `Connecting`.
    fn begin_connect(&mut self) -> u64 {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.generation
    }
}

/// What to do after an unexpected close.
enum Next {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
    Stop,
}

struct Inner {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    registry: Arc<SubscriberRegistry>,
    observers: RwLock<Observers>,
    link: Mutex<Link>,
}

/// Handle to the live channel. Clones share one socket and one registry.
///
/// Methods that start work spawn tokio tasks and must be called inside a
/// tokio runtime.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    pub fn new(connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                policy,
                registry: Arc::new(SubscriberRegistry::default()),
                observers: RwLock::new(Observers::default()),
                link: Mutex::new(Link::new()),
            }),
        }
    }

    /// Open the socket unless one is already open or being opened.
    pub fn connect(&self) {
        let generation = {
            let mut link = self.inner.link.lock();
            if link.state.is_active() {
                debug!(state = %link.state, "Connect ignored, channel already active");
                return;
            }
            link.caller_closed = false;
            link.begin_connect()
        };
        Inner::spawn_connection(&self.inner, generation);
    }

    /// Close the socket and suppress reconnection until the next `connect()`.
    pub fn disconnect(&self) {
        let (was_open, outbound) = {
            let mut link = self.inner.link.lock();
            link.caller_closed = true;
            if let Some(timer) = link.reconnect_timer.take() {
                timer.abort();
            }
            link.generation += 1;
            let was_open = matches!(link.state, ConnectionState::Open | ConnectionState::Closing);
            link.state = ConnectionState::Closed;
            (was_open, link.outbound.take())
        };

        if let Some(outbound) = outbound {
            let _ = outbound.send(Outbound::Close);
        }
        info!("Channel disconnected by caller");

        if was_open {
            self.inner.emit_disconnect(&DisconnectReason::ClientInitiated);
        }
    }

    /// Queue `{type, payload}` on the open socket.
    ///
    /// Returns `false` without queuing anything unless the channel is open.
    /// `true` means queued, not delivered.
    pub fn send<P: Serialize + ?Sized>(&self, message_type: &str, payload: &P) -> bool {
        let link = self.inner.link.lock();
        if link.state != ConnectionState::Open {
            trace!(
                message_type = %message_type,
                state = %link.state,
                "Send refused, channel not open"
            );
            return false;
        }
        let Some(outbound) = &link.outbound else {
            return false;
        };

        let frame = serde_json::to_value(payload)
            .and_then(|payload| Envelope::new(message_type, payload).encode());
        match frame {
            Ok(text) => outbound.send(Outbound::Text(text)).is_ok(),
            Err(e) => {
                warn!(
                    message_type = %message_type,
                    error = %e,
                    "Outbound payload did not serialize"
                );
                false
            }
        }
    }

    /// Register `handler` for every inbound envelope of `message_type`.
    pub fn subscribe<F>(&self, message_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.registry.add(message_type, Arc::new(handler));
        debug!(message_type = %message_type, id, "Subscriber added");
        Subscription::new(&self.inner.registry, message_type, id)
    }

    /// Like [`subscribe`](Self::subscribe) but decodes the payload as `T` first.
    ///
    /// Payloads that do not decode are logged and skipped for this handler.
    pub fn subscribe_as<T, F>(&self, message_type: &str, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let owned_type = message_type.to_string();
        self.subscribe(message_type, move |payload: &Value| {
            match T::deserialize(payload) {
                Ok(value) => handler(value),
                Err(e) => warn!(
                    message_type = %owned_type,
                    error = %e,
                    "Payload did not match subscriber type"
                ),
            }
        })
    }

    pub fn on_connect<F>(&self, observer: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.observers.write().connect.push(Arc::new(observer));
    }

    pub fn on_disconnect<F>(&self, observer: F)
    where
        F: Fn(&DisconnectReason) + Send + Sync + 'static,
    {
        self.inner.observers.write().disconnect.push(Arc::new(observer));
    }

    pub fn on_error<F>(&self, observer: F)
    where
        F: Fn(&ChannelError) + Send + Sync + 'static,
    {
        self.inner.observers.write().error.push(Arc::new(observer));
    }

    /// Reconnect promptly after the host returns from the background.
    ///
    /// Ignored if the caller closed the channel, it is already active, or it
    /// was never connected. Otherwise the attempt counter starts over.
    pub fn resume(&self) {
        let generation = {
            let mut link = self.inner.link.lock();
            if link.caller_closed
                || link.state.is_active()
                || link.state == ConnectionState::Idle
            {
                debug!(state = %link.state, "Resume ignored");
                return;
            }
            link.attempts = 0;
            link.begin_connect()
        };
        info!("Resuming channel");
        Inner::spawn_connection(&self.inner, generation);
    }

    /// Disconnect and drop every subscription and observer.
    pub fn teardown(&self) {
        self.disconnect();
        self.inner.registry.clear();
        *self.inner.observers.write() = Observers::default();
        info!("Channel torn down");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.link.lock().attempts
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.link.lock().generation == generation
    }

    fn spawn_connection(inner: &Arc<Inner>, generation: u64) {
        let task_inner = inner.clone();
        tokio::spawn(async move {
            Inner::run_connection(task_inner, generation).await;
        });
    }

    async fn run_connection(inner: Arc<Inner>, generation: u64) {
        debug!(generation, "Opening channel socket");

        let connection = match inner.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                if !inner.is_current(generation) {
                    return;
                }
                warn!(generation, error = %e, "Channel connect failed");
                {
                    let mut link = inner.link.lock();
                    if link.generation == generation {
                        link.state = ConnectionState::Closed;
                    }
                }
                inner.emit_error(&e);
                Inner::schedule_reconnect(&inner, generation);
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let superseded = {
            let mut link = inner.link.lock();
            if link.generation != generation || link.caller_closed {
                true
            } else {
                link.state = ConnectionState::Open;
                link.attempts = 0;
                link.outbound = Some(outbound_tx);
                false
            }
        };

        if superseded {
            debug!(generation, "Socket opened for a superseded generation, closing it");
            let mut sink = connection.sink;
            let _ = sink.close().await;
            return;
        }

        info!(generation, "Channel open");
        inner.emit_connect();

        let reason = Inner::pump(&inner, generation, connection, outbound_rx).await;
        Inner::handle_close(&inner, generation, reason);
    }

    /// Shuttle frames both ways until the socket ends or the manager closes it.
    async fn pump(
        inner: &Arc<Inner>,
        generation: u64,
        connection: Connection,
        mut outbound: mpsc::UnboundedReceiver<Outbound>,
    ) -> DisconnectReason {
        let Connection { mut sink, mut frames } = connection;

        loop {
            tokio::select! {
                command = outbound.recv() => match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = sink.send_text(text).await {
                            inner.report_transport_error(generation, &e);
                            return DisconnectReason::TransportError(e.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = sink.close().await;
                        return DisconnectReason::ClientInitiated;
                    }
                },
                frame = frames.next() => match frame {
                    Some(Ok(InboundFrame::Text(text))) => inner.dispatch(generation, &text),
                    Some(Ok(InboundFrame::Closed { code, reason })) => {
                        inner.mark_closing(generation);
                        let _ = sink.close().await;
                        return DisconnectReason::ServerClosed { code, reason };
                    }
                    Some(Err(e)) => {
                        inner.report_transport_error(generation, &e);
                        return DisconnectReason::TransportError(e.to_string());
                    }
                    None => {
                        return DisconnectReason::ServerClosed {
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }
                },
            }
        }
    }

    fn handle_close(inner: &Arc<Inner>, generation: u64, reason: DisconnectReason) {
        {
            let mut link = inner.link.lock();
            if link.generation != generation {
                trace!(generation, "Superseded socket finished");
                return;
            }
            link.state = ConnectionState::Closed;
            link.outbound = None;
        }

        warn!(generation, reason = ?reason, "Channel closed unexpectedly");
        inner.emit_disconnect(&reason);

        if reason.is_unexpected() {
            Inner::schedule_reconnect(inner, generation);
        }
    }

    fn schedule_reconnect(inner: &Arc<Inner>, generation: u64) {
        let next = {
            let mut link = inner.link.lock();
            if link.generation != generation || link.caller_closed {
                Next::Stop
            } else if inner.policy.allows(link.attempts) {
                link.attempts += 1;
                link.state = ConnectionState::ReconnectPending;
                Next::Retry {
                    attempt: link.attempts,
                    delay: inner.policy.delay_for_attempt(link.attempts),
                }
            } else {
                link.state = ConnectionState::Closed;
                Next::GiveUp {
                    attempts: link.attempts,
                }
            }
        };

        match next {
            Next::Stop => {}
            Next::GiveUp { attempts } => {
                error!(attempts, "Channel reconnect attempts exhausted");
                inner.emit_error(&ChannelError::ReconnectExhausted { attempts });
            }
            Next::Retry { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts = inner.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Channel reconnect scheduled"
                );
                let timer_inner = inner.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    Inner::fire_reconnect(&timer_inner, generation);
                });

                let mut link = inner.link.lock();
                let still_pending = link.generation == generation
                    && link.state == ConnectionState::ReconnectPending;
                if still_pending {
                    link.reconnect_timer = Some(timer);
                } else {
                    timer.abort();
                }
            }
        }
    }

    fn fire_reconnect(inner: &Arc<Inner>, generation: u64) {
        let next_generation = {
            let mut link = inner.link.lock();
            if link.generation != generation
                || link.caller_closed
                || link.state != ConnectionState::ReconnectPending
            {
                return;
            }
            // Detach rather than abort; this code runs on the timer task.
            link.reconnect_timer = None;
            link.begin_connect()
        };
        debug!(generation = next_generation, "Reconnect timer fired");
        Inner::spawn_connection(inner, next_generation);
    }

    fn mark_closing(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation && link.state == ConnectionState::Open {
            link.state = ConnectionState::Closing;
            link.outbound = None;
        }
    }

    fn report_transport_error(&self, generation: u64, err: &ChannelError) {
        if self.is_current(generation) {
            self.emit_error(err);
        }
    }

    fn dispatch(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, frame_len = text.len(), "Dropping frame that is not an envelope");
                self.emit_error(&ChannelError::Decode(e.to_string()));
                return;
            }
        };

        let handlers = self.registry.handlers_for(&envelope.message_type);
        if handlers.is_empty() {
            trace!(message_type = %envelope.message_type, "No subscribers for message type");
            return;
        }

        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&envelope.payload))) {
                let message = panic_message(panic.as_ref());
                error!(
                    message_type = %envelope.message_type,
                    panic = %message,
                    "Subscriber panicked"
                );
                self.emit_error(&ChannelError::Handler {
                    message_type: envelope.message_type.clone(),
                    message,
                });
            }
        }
    }

    fn emit_connect(&self) {
        let observers = self.observers.read().connect.clone();
        for observer in observers {
            guarded("on_connect", || observer());
        }
    }

    fn emit_disconnect(&self, reason: &DisconnectReason) {
        let observers = self.observers.read().disconnect.clone();
        for observer in observers {
            guarded("on_disconnect", || observer(reason));
        }
    }

    fn emit_error(&self, err: &ChannelError) {
        let observers = self.observers.read().error.clone();
        for observer in observers {
            guarded("on_error", || observer(err));
        }
    }
}

/// Run an observer, logging instead of unwinding if it panics.
fn guarded(kind: &str, call: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
        let message = panic_message(panic.as_ref());
        error!(observer = kind, panic = %message, "Channel observer panicked");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
