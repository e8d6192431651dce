use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::*;

type FrameSender = mpsc::UnboundedSender<Result<InboundFrame, ChannelError>>;

/// Server side of one mocked socket.
#[derive(Clone)]
struct Peer {
    inbound: FrameSender,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    fn push_text(&self, text: &str) {
        let _ = self.inbound.send(Ok(InboundFrame::Text(text.to_string())));
    }

    fn push_envelope(&self, message_type: &str, payload: Value) {
        self.push_text(&json!({"type": message_type, "payload": payload}).to_string());
    }

    fn server_close(&self) {
        let _ = self.inbound.send(Ok(InboundFrame::Closed {
            code: Some(1001),
            reason: "restarting".to_string(),
        }));
    }

    fn fail(&self) {
        let _ = self
            .inbound
            .send(Err(ChannelError::Transport("connection reset".to_string())));
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

enum Plan {
    Accept,
    Refuse,
}

/// Connector that follows a script; refuses once the script runs out.
#[derive(Default)]
struct MockConnector {
    plans: Mutex<VecDeque<Plan>>,
    attempts: Mutex<Vec<Instant>>,
    peers: Mutex<Vec<Peer>>,
}

impl MockConnector {
    fn scripted(plans: impl IntoIterator<Item = Plan>) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(plans.into_iter().collect()),
            ..Default::default()
        })
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    fn peer(&self, index: usize) -> Peer {
        self.peers.lock()[index].clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Connection, ChannelError> {
        self.attempts.lock().push(Instant::now());
        let plan = self.plans.lock().pop_front().unwrap_or(Plan::Refuse);

        match plan {
            Plan::Refuse => Err(ChannelError::Connect("connection refused".to_string())),
            Plan::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let sent = Arc::new(Mutex::new(Vec::new()));
                let closed = Arc::new(AtomicBool::new(false));
                self.peers.lock().push(Peer {
                    inbound: tx,
                    sent: sent.clone(),
                    closed: closed.clone(),
                });

                let frames = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|frame| (frame, rx))
                })
                .boxed();

                Ok(Connection {
                    sink: Box::new(MockSink { sent, closed }),
                    frames,
                })
            }
        }
    }
}

/// Observer call log shared with the manager.
#[derive(Default)]
struct Events {
    connects: Mutex<u32>,
    disconnects: Mutex<Vec<DisconnectReason>>,
    errors: Mutex<Vec<ChannelError>>,
}

fn observed(manager: &ChannelManager) -> Arc<Events> {
    let events = Arc::new(Events::default());

    let e = events.clone();
    manager.on_connect(move || *e.connects.lock() += 1);
    let e = events.clone();
    manager.on_disconnect(move |reason| e.disconnects.lock().push(reason.clone()));
    let e = events.clone();
    manager.on_error(move |err| e.errors.lock().push(err.clone()));

    events
}

const INTERVAL: Duration = Duration::from_millis(3000);

fn manager_with(connector: Arc<MockConnector>, max_attempts: u32) -> ChannelManager {
    ChannelManager::new(connector, ReconnectPolicy::new(INTERVAL, max_attempts))
}

/// Let spawned tasks run without moving the paused clock far.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_opens_and_notifies() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    assert_eq!(manager.state(), ConnectionState::Idle);
    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Connecting);
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(*events.connects.lock(), 1);
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_active_is_noop() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);

    manager.connect();
    manager.connect();
    settle().await;
    manager.connect();
    settle().await;

    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_delays_grow_linearly_until_cap() {
    // Arrange: every attempt is refused
    let connector = MockConnector::scripted([]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    // Act
    manager.connect();
    tokio::time::sleep(INTERVAL * 20).await;

    // Assert: initial try plus five reconnects at ×1, ×2, ×3, ×4, ×5
    let times = connector.attempt_times();
    assert_eq!(times.len(), 6);
    for (n, pair) in times.windows(2).enumerate() {
        assert_eq!(pair[1] - pair[0], INTERVAL * (n as u32 + 1));
    }

    assert_eq!(manager.state(), ConnectionState::Closed);
    let errors = events.errors.lock();
    assert_eq!(errors.len(), 7);
    assert_eq!(
        errors.last(),
        Some(&ChannelError::ReconnectExhausted { attempts: 5 })
    );
    assert!(events.disconnects.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_close_schedules_reconnect_and_success_resets_counter() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Refuse, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    manager.connect();
    settle().await;
    let opened_at = Instant::now();

    connector.peer(0).server_close();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::ReconnectPending);
    assert_eq!(manager.reconnect_attempts(), 1);
    assert!(connector.peer(0).closed.load(Ordering::SeqCst));
    assert_eq!(
        events.disconnects.lock().as_slice(),
        &[DisconnectReason::ServerClosed {
            code: Some(1001),
            reason: "restarting".to_string()
        }]
    );

    tokio::time::sleep(INTERVAL * 4).await;

    let times = connector.attempt_times();
    assert_eq!(times.len(), 3);
    assert!(times[1] - opened_at >= INTERVAL);
    assert_eq!(times[2] - times[1], INTERVAL * 2);
    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(*events.connects.lock(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_reports_and_reconnects() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    manager.connect();
    settle().await;
    connector.peer(0).fail();
    settle().await;

    assert_eq!(
        events.errors.lock().as_slice(),
        &[ChannelError::Transport("connection reset".to_string())]
    );
    assert!(matches!(
        events.disconnects.lock().as_slice(),
        [DisconnectReason::TransportError(_)]
    ));

    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    manager.connect();
    settle().await;
    connector.peer(0).server_close();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::ReconnectPending);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Closed);

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(events.disconnects.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_open_socket_without_reconnect() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    manager.connect();
    settle().await;
    manager.disconnect();
    settle().await;

    assert!(connector.peer(0).closed.load(Ordering::SeqCst));
    assert_eq!(
        events.disconnects.lock().as_slice(),
        &[DisconnectReason::ClientInitiated]
    );

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting_discards_late_socket() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    manager.connect();
    manager.disconnect();
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(connector.peer(0).closed.load(Ordering::SeqCst));
    assert_eq!(*events.connects.lock(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_only_when_open() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);

    assert!(!manager.send("subscribe", &json!({"symbols": ["SOL"]})));

    manager.connect();
    assert!(!manager.send("subscribe", &json!({"symbols": ["SOL"]})));
    settle().await;

    assert!(manager.send("subscribe", &json!({"symbols": ["SOL"]})));
    settle().await;

    let sent = connector.peer(0).sent.lock().clone();
    assert_eq!(sent.len(), 1);
    let envelope = Envelope::decode(&sent[0]).unwrap();
    assert_eq!(envelope.message_type, "subscribe");
    assert_eq!(envelope.payload, json!({"symbols": ["SOL"]}));

    manager.disconnect();
    assert!(!manager.send("subscribe", &json!({})));
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_only_see_their_type() {
    // Arrange
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    let prices = Arc::new(Mutex::new(Vec::new()));
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let p = prices.clone();
    let _price_sub =
        manager.subscribe("price_update", move |payload| p.lock().push(payload.clone()));
    let a = alerts.clone();
    let _alert_sub = manager.subscribe("alert", move |payload| a.lock().push(payload.clone()));

    manager.connect();
    settle().await;
    let peer = connector.peer(0);

    // Act
    peer.push_envelope("price_update", json!({"symbol": "SOL", "price": 150.0}));
    peer.push_text("{this is not json");
    peer.push_text(r#"{"payload": {"missing": "type"}}"#);
    peer.push_text(r#"["alert", {"level": "warning", "message": "positional"}]"#);
    peer.push_envelope("alert", json!({"level": "info", "message": "hi"}));
    peer.push_envelope("price_update", json!({"symbol": "SOL", "price": 151.0}));
    settle().await;

    // Assert
    assert_eq!(
        *prices.lock(),
        vec![
            json!({"symbol": "SOL", "price": 150.0}),
            json!({"symbol": "SOL", "price": 151.0})
        ]
    );
    assert_eq!(*alerts.lock(), vec![json!({"level": "info", "message": "hi"})]);

    let errors = events.errors.lock();
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| matches!(e, ChannelError::Decode(_))));
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_handler_panic_is_isolated() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);

    let reached = Arc::new(Mutex::new(0u32));
    let _bad = manager.subscribe("alert", |_| panic!("handler bug"));
    let r = reached.clone();
    let _good = manager.subscribe("alert", move |_| *r.lock() += 1);

    manager.connect();
    settle().await;
    connector.peer(0).push_envelope("alert", json!({}));
    connector.peer(0).push_envelope("alert", json!({}));
    settle().await;

    assert_eq!(*reached.lock(), 2);
    let errors = events.errors.lock();
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0],
        ChannelError::Handler {
            message_type: "alert".to_string(),
            message: "handler bug".to_string()
        }
    );
    assert_eq!(manager.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery() {
    let connector = MockConnector::scripted([Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);

    let count = Arc::new(Mutex::new(0u32));
    let c = count.clone();
    let subscription = manager.subscribe("price_update", move |_| *c.lock() += 1);
    assert_eq!(subscription.message_type(), "price_update");

    manager.connect();
    settle().await;
    connector.peer(0).push_envelope("price_update", json!({}));
    settle().await;

    subscription.unsubscribe();
    connector.peer(0).push_envelope("price_update", json!({}));
    settle().await;

    assert_eq!(*count.lock(), 1);
    assert_eq!(manager.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_survive_reconnect() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let _sub = manager.subscribe_as::<shared::PriceUpdate, _>("price_update", move |tick| {
        s.lock().push(tick.price)
    });

    manager.connect();
    settle().await;
    connector
        .peer(0)
        .push_envelope("price_update", json!({"symbol": "SOL", "price": 1.0, "timestamp": 1}));
    settle().await;
    connector.peer(0).server_close();
    tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;

    assert_eq!(manager.state(), ConnectionState::Open);
    connector
        .peer(1)
        .push_envelope("price_update", json!({"symbol": "SOL", "price": 2.0, "timestamp": 2}));
    connector.peer(1).push_envelope("price_update", json!({"symbol": "SOL"}));
    settle().await;

    assert_eq!(*seen.lock(), vec![1.0, 2.0]);
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_exhaustion_starts_fresh() {
    let connector = MockConnector::scripted([Plan::Refuse, Plan::Refuse, Plan::Accept]);
    let manager = manager_with(connector.clone(), 1);

    manager.connect();
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(connector.attempt_count(), 2);

    manager.resume();
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(connector.attempt_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_resume_ignored_when_idle_or_caller_closed() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);

    manager.resume();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Idle);

    manager.connect();
    settle().await;
    manager.disconnect();
    manager.resume();
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_drops_subscribers_and_observers() {
    let connector = MockConnector::scripted([Plan::Accept, Plan::Accept]);
    let manager = manager_with(connector.clone(), 5);
    let events = observed(&manager);
    let _sub = manager.subscribe("alert", |_| {});

    manager.connect();
    settle().await;
    manager.teardown();
    settle().await;

    assert_eq!(manager.subscriber_count(), 0);
    assert_eq!(events.disconnects.lock().len(), 1);

    manager.connect();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(*events.connects.lock(), 1);
}
