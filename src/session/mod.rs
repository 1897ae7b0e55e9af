// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Publish/subscribe session - one bus connection and its lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──code 0──▶ Connected
//!      ▲                          │                      │
//!      │                      code != 0                  │
//!      │                          ▼                      │
//!      └──────disconnect()────  Failed   ◀── (no retry)  │
//!      └──────────────disconnect() / connection lost ────┘
//! ```
//!
//! The transport runs its own delivery loop and reports back through a
//! [`Delivery`] handle. Each `connect()` starts a new generation; events
//! carrying an older generation are ignored, so a late acknowledgement from
//! a torn-down connection can never revive the session.

mod mqtt;

pub use mqtt::{MqttConnector, TRANSPORT_FAILURE};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{Role, SessionConfig};
use crate::error::{Error, Result};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Waiting for the broker's acknowledgement
    Connecting,
    /// Acknowledged and usable
    Connected,
    /// Broker refused or transport failed; terminal until reset
    Failed,
}

/// Observer of connection lifecycle events
pub trait ConnectionListener: Send + Sync {
    /// Invoked exactly once per successful connection
    fn on_connected(&self);

    /// Every state transition
    fn on_state_changed(&self, _state: SessionState) {}

    /// Connection attempt rejected
    fn on_connection_failed(&self, _error: &Error) {}
}

/// Receives every inbound message, in arrival order, on the delivery thread
pub trait MessageHandler: Send + Sync {
    /// One inbound message with its raw payload
    fn on_message(&self, topic: &str, payload: &[u8]);
}

/// Outbound half of an open transport connection. Calls must not block.
pub trait BusLink: Send + Sync {
    /// Request a subscription
    fn subscribe(&self, filter: &str) -> Result<()>;

    /// Queue one outbound message
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Close the connection
    fn disconnect(&self) -> Result<()>;
}

/// Opens transport connections and drives their delivery loops
pub trait Connector: Send + Sync {
    /// Start connecting; results are reported through `delivery`
    fn open(&self, config: &SessionConfig, delivery: Delivery) -> Result<Box<dyn BusLink>>;
}

struct Shared {
    state: SessionState,
    generation: u64,
    link: Option<Box<dyn BusLink>>,
    filter: String,
    pending_subscribe: bool,
    failure_code: Option<u8>,
}

struct Inner {
    role: Role,
    shared: Mutex<Shared>,
    listeners: RwLock<Vec<Arc<dyn ConnectionListener>>>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn listeners(&self) -> Vec<Arc<dyn ConnectionListener>> {
        self.listeners.read().clone()
    }

    fn notify_state(&self, state: SessionState) {
        for listener in self.listeners() {
            listener.on_state_changed(state);
        }
    }

    fn send(&self, op: impl FnOnce(&dyn BusLink) -> Result<()>) -> Result<()> {
        let shared = self.shared.lock();
        match (&shared.state, &shared.link) {
            (SessionState::Connected, Some(link)) => op(link.as_ref()),
            _ => Err(Error::NotConnected),
        }
    }

    fn subscribe_filter(&self, shared: &mut Shared) {
        match &shared.link {
            Some(link) => match link.subscribe(&shared.filter) {
                Ok(()) => info!("Subscribed to topic: {}", shared.filter),
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("Subscribe to {} failed: {}", shared.filter, e);
                }
            },
            None => shared.pending_subscribe = true,
        }
    }
}

/// Handle given to a transport's delivery loop
#[derive(Clone)]
pub struct Delivery {
    inner: Arc<Inner>,
    generation: u64,
}

impl Delivery {
    /// Whether this handle still belongs to the session's live connection
    pub fn is_current(&self) -> bool {
        self.inner.shared.lock().generation == self.generation
    }

    /// Connection result from the transport, 0 on success
    pub fn connection_result(&self, code: u8) {
        let inner = &self.inner;
        let mut shared = inner.shared.lock();
        if shared.generation != self.generation || shared.state != SessionState::Connecting {
            debug!("Ignoring connection result {} for stale or settled connection", code);
            return;
        }

        if code == 0 {
            shared.state = SessionState::Connected;
            info!("Connected successfully to broker");
            if inner.role.is_subscriber() {
                inner.subscribe_filter(&mut shared);
            }
            drop(shared);

            inner.notify_state(SessionState::Connected);
            for listener in inner.listeners() {
                listener.on_connected();
            }
        } else {
            shared.state = SessionState::Failed;
            shared.failure_code = Some(code);
            let link = shared.link.take();
            drop(shared);
            drop(link);

            let err = Error::ConnectionFailed { code };
            error!("Failed to connect: {}", err);
            inner.notify_state(SessionState::Failed);
            for listener in inner.listeners() {
                listener.on_connection_failed(&err);
            }
        }
    }

    /// Inbound message from the bus
    pub fn message(&self, topic: &str, payload: &[u8]) {
        let handler = {
            let shared = self.inner.shared.lock();
            if shared.generation != self.generation || shared.state != SessionState::Connected {
                debug!("Ignoring message on {} outside the live connection", topic);
                return;
            }
            self.inner.handler.read().clone()
        };

        self.inner.delivered.fetch_add(1, Ordering::Relaxed);
        match handler {
            Some(handler) => handler.on_message(topic, payload),
            None => debug!("No message handler registered, discarding message on {}", topic),
        }
    }

    /// The established connection dropped. No reconnect is attempted.
    pub fn connection_lost(&self, reason: &str) {
        let link = {
            let mut shared = self.inner.shared.lock();
            if shared.generation != self.generation || shared.state != SessionState::Connected {
                return;
            }
            shared.state = SessionState::Disconnected;
            shared.link.take()
        };
        drop(link);

        warn!("Disconnected from broker: {}", reason);
        self.inner.notify_state(SessionState::Disconnected);
    }
}

/// One client session on the bus
pub struct PubSubSession {
    inner: Arc<Inner>,
    connector: Arc<dyn Connector>,
}

impl PubSubSession {
    /// Session for `role` over transports opened by `connector`
    pub fn new(role: Role, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                role,
                shared: Mutex::new(Shared {
                    state: SessionState::Disconnected,
                    generation: 0,
                    link: None,
                    filter: String::new(),
                    pending_subscribe: false,
                    failure_code: None,
                }),
                listeners: RwLock::new(Vec::new()),
                handler: RwLock::new(None),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            connector,
        }
    }

    /// Role this session serves
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().state
    }

    /// Whether the session can publish
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Result code of the last failed connection attempt
    pub fn failure_code(&self) -> Option<u8> {
        self.inner.shared.lock().failure_code
    }

    /// Publishes and subscribes dropped because the session was not connected
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Messages handed to the message handler
    pub fn delivered_count(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// Register a lifecycle observer
    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Install the inbound message handler
    pub fn set_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.inner.handler.write() = Some(handler);
    }

    /// Start connecting. Completion arrives asynchronously through the
    /// transport; an existing connection is torn down first.
    pub fn connect(&self, config: &SessionConfig) -> Result<()> {
        let (generation, previous) = {
            let mut shared = self.inner.shared.lock();
            let previous = shared.link.take();
            shared.generation += 1;
            shared.state = SessionState::Connecting;
            shared.filter = config.topic_filter().to_string();
            shared.pending_subscribe = false;
            shared.failure_code = None;
            (shared.generation, previous)
        };
        if let Some(link) = previous {
            if let Err(e) = link.disconnect() {
                debug!("Previous connection teardown failed: {}", e);
            }
        }

        self.inner.notify_state(SessionState::Connecting);
        info!(
            "Connecting to broker {}:{} as {}",
            config.broker_address(),
            config.broker_port(),
            config.identity()
        );

        let delivery = Delivery {
            inner: self.inner.clone(),
            generation,
        };

        match self.connector.open(config, delivery) {
            Ok(link) => {
                let mut shared = self.inner.shared.lock();
                if shared.generation != generation || shared.state == SessionState::Failed {
                    drop(shared);
                    if let Err(e) = link.disconnect() {
                        debug!("Teardown of superseded connection failed: {}", e);
                    }
                    return Ok(());
                }
                shared.link = Some(link);
                if shared.pending_subscribe {
                    shared.pending_subscribe = false;
                    self.inner.subscribe_filter(&mut shared);
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut shared = self.inner.shared.lock();
                    if shared.generation == generation {
                        shared.state = SessionState::Failed;
                        if let Error::ConnectionFailed { code } = &e {
                            shared.failure_code = Some(*code);
                        }
                    }
                }
                error!("Could not open connection: {}", e);
                self.inner.notify_state(SessionState::Failed);
                for listener in self.inner.listeners() {
                    listener.on_connection_failed(&e);
                }
                Err(e)
            }
        }
    }

    /// Tear down the connection. Always ends in `Disconnected`; repeated
    /// calls are no-ops.
    pub fn disconnect(&self) {
        let (previous, link) = {
            let mut shared = self.inner.shared.lock();
            let previous = shared.state;
            shared.state = SessionState::Disconnected;
            shared.generation += 1;
            shared.pending_subscribe = false;
            (previous, shared.link.take())
        };

        if let Some(link) = link {
            if let Err(e) = link.disconnect() {
                warn!("Disconnect request failed: {}", e);
            }
        }

        if previous != SessionState::Disconnected {
            info!("Disconnected from broker");
            self.inner.notify_state(SessionState::Disconnected);
        }
    }

    /// Subscribe to an additional filter. Dropped with a warning when not connected.
    pub fn subscribe(&self, filter: &str) {
        match self.inner.send(|link| link.subscribe(filter)) {
            Ok(()) => info!("Subscribed to topic: {}", filter),
            Err(e) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Cannot subscribe to {}: {}", filter, e);
            }
        }
    }

    /// Publish a payload. Dropped with a warning when not connected; never queued.
    pub fn publish(&self, topic: &str, payload: &str) {
        match self.inner.send(|link| link.publish(topic, payload.as_bytes())) {
            Ok(()) => debug!("Published to {}: {}", topic, payload),
            Err(Error::NotConnected) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Connection is not established, cannot publish to {}", topic);
            }
            Err(e) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Publish to {} failed: {}", topic, e);
            }
        }
    }
}

impl Drop for PubSubSession {
    fn drop(&mut self) {
        if self.state() != SessionState::Disconnected {
            self.disconnect();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockConnector;
    use super::*;
    use crate::config::{ConnectionSettings, DeviceIdentity};

    #[derive(Default)]
    struct CountingListener {
        connected: AtomicU64,
        failures: Mutex<Vec<String>>,
        states: Mutex<Vec<SessionState>>,
    }

    impl ConnectionListener for CountingListener {
        fn on_connected(&self) {
            self.connected.fetch_add(1, Ordering::Relaxed);
        }

        fn on_state_changed(&self, state: SessionState) {
            self.states.lock().push(state);
        }

        fn on_connection_failed(&self, error: &Error) {
            self.failures.lock().push(error.to_string());
        }
    }

    #[derive(Default)]
    struct CollectingHandler {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MessageHandler for CollectingHandler {
        fn on_message(&self, topic: &str, payload: &[u8]) {
            self.messages.lock().push((topic.to_string(), payload.to_vec()));
        }
    }

    fn session_config(role: Role) -> SessionConfig {
        ConnectionSettings::default()
            .validate(DeviceIdentity::generate(role))
            .unwrap()
    }

    fn session(role: Role) -> (PubSubSession, Arc<MockConnector>, Arc<CountingListener>) {
        let connector = Arc::new(MockConnector::default());
        let session = PubSubSession::new(role, connector.clone());
        let listener = Arc::new(CountingListener::default());
        session.add_listener(listener.clone());
        (session, connector, listener)
    }

    #[test]
    fn test_successful_connection_subscribes_once() {
        let (session, connector, listener) = session(Role::Hospital);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect(&session_config(Role::Hospital)).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let delivery = connector.delivery();
        delivery.connection_result(0);
        assert!(session.is_connected());
        assert_eq!(*connector.link.subscribed.lock(), vec!["smartbracelet/#".to_string()]);
        assert_eq!(listener.connected.load(Ordering::Relaxed), 1);

        // A duplicate acknowledgement does not re-notify
        delivery.connection_result(0);
        assert_eq!(listener.connected.load(Ordering::Relaxed), 1);
        assert_eq!(connector.link.subscribed.lock().len(), 1);
        assert_eq!(
            *listener.states.lock(),
            vec![SessionState::Connecting, SessionState::Connected]
        );
    }

    #[test]
    fn test_publisher_does_not_subscribe() {
        let (session, connector, listener) = session(Role::Bracelet);
        session.connect(&session_config(Role::Bracelet)).unwrap();
        connector.delivery().connection_result(0);

        assert!(session.is_connected());
        assert!(connector.link.subscribed.lock().is_empty());
        assert_eq!(listener.connected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_connection_is_terminal() {
        let (session, connector, listener) = session(Role::Smartphone);
        session.connect(&session_config(Role::Smartphone)).unwrap();

        let delivery = connector.delivery();
        delivery.connection_result(5);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failure_code(), Some(5));
        assert_eq!(listener.connected.load(Ordering::Relaxed), 0);
        assert_eq!(listener.failures.lock().len(), 1);

        // Late success for the failed attempt is ignored
        delivery.connection_result(0);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(connector.link.subscribed.lock().is_empty());

        session.publish("smartbracelet/1/oxygen", "Oxygen Level: 95");
        assert!(connector.link.published.lock().is_empty());
    }

    #[test]
    fn test_publish_while_disconnected_is_dropped() {
        let (session, connector, _) = session(Role::Bracelet);

        session.publish("smartbracelet/1/heart_rate", "Heart Rate: 80");
        assert!(connector.link.published.lock().is_empty());
        assert_eq!(session.dropped_count(), 1);

        session.subscribe("smartbracelet/1/#");
        assert!(connector.link.subscribed.lock().is_empty());
        assert_eq!(session.dropped_count(), 2);
    }

    #[test]
    fn test_publish_while_connected() {
        let (session, connector, _) = session(Role::Bracelet);
        session.connect(&session_config(Role::Bracelet)).unwrap();

        // Not yet acknowledged
        session.publish("smartbracelet/1/sugar", "Blood Sugar: 150");
        assert!(connector.link.published.lock().is_empty());

        connector.delivery().connection_result(0);
        session.publish("smartbracelet/1/sugar", "Blood Sugar: 150");
        assert_eq!(
            *connector.link.published.lock(),
            vec![("smartbracelet/1/sugar".to_string(), "Blood Sugar: 150".to_string())]
        );
        assert_eq!(session.dropped_count(), 1);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (session, connector, listener) = session(Role::Hospital);
        session.connect(&session_config(Role::Hospital)).unwrap();
        connector.delivery().connection_result(0);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);

        assert_eq!(connector.link.disconnects.load(Ordering::Relaxed), 1);
        let states = listener.states.lock();
        assert_eq!(states.last(), Some(&SessionState::Disconnected));
        assert_eq!(states.iter().filter(|s| **s == SessionState::Disconnected).count(), 1);
    }

    #[test]
    fn test_disconnect_from_failed() {
        let (session, connector, _) = session(Role::Hospital);
        session.connect(&session_config(Role::Hospital)).unwrap();
        connector.delivery().connection_result(4);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_messages_dispatched_in_order() {
        let (session, connector, _) = session(Role::Hospital);
        let handler = Arc::new(CollectingHandler::default());
        session.set_message_handler(handler.clone());

        session.connect(&session_config(Role::Hospital)).unwrap();
        let delivery = connector.delivery();

        // Before the acknowledgement nothing is dispatched
        delivery.message("smartbracelet/1/oxygen", b"Oxygen Level: 97");
        delivery.connection_result(0);
        for i in 0..5 {
            delivery.message("smartbracelet/1/heart_rate", format!("Heart Rate: {}", 70 + i).as_bytes());
        }

        let messages = handler.messages.lock();
        assert_eq!(messages.len(), 5);
        for (i, (_, payload)) in messages.iter().enumerate() {
            assert_eq!(payload, format!("Heart Rate: {}", 70 + i).as_bytes());
        }
        assert_eq!(session.delivered_count(), 5);
    }

    #[test]
    fn test_stale_delivery_ignored_after_reconnect() {
        let (session, connector, listener) = session(Role::Hospital);
        let handler = Arc::new(CollectingHandler::default());
        session.set_message_handler(handler.clone());

        session.connect(&session_config(Role::Hospital)).unwrap();
        let first = connector.delivery();
        first.connection_result(0);

        session.connect(&session_config(Role::Hospital)).unwrap();
        let second = connector.delivery();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(session.state(), SessionState::Connecting);

        first.message("smartbracelet/1/sugar", b"Blood Sugar: 300");
        first.connection_lost("socket closed");
        assert_eq!(session.state(), SessionState::Connecting);

        second.connection_result(0);
        assert!(session.is_connected());
        assert_eq!(listener.connected.load(Ordering::Relaxed), 2);
        assert!(handler.messages.lock().is_empty());
    }

    #[test]
    fn test_connection_lost() {
        let (session, connector, listener) = session(Role::Hospital);
        session.connect(&session_config(Role::Hospital)).unwrap();
        let delivery = connector.delivery();
        delivery.connection_result(0);

        delivery.connection_lost("keep-alive timeout");
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(listener.states.lock().last(), Some(&SessionState::Disconnected));

        session.publish("smartbracelet/1/oxygen", "Oxygen Level: 95");
        assert!(connector.link.published.lock().is_empty());
    }

    #[test]
    fn test_connector_error_fails_session() {
        let connector = Arc::new(MockConnector {
            refuse: true,
            ..MockConnector::default()
        });
        let session = PubSubSession::new(Role::Hospital, connector);
        let err = session.connect(&session_config(Role::Hospital)).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    struct DisconnectingHandler {
        session: Mutex<Option<Arc<PubSubSession>>>,
        seen: AtomicU64,
    }

    impl MessageHandler for DisconnectingHandler {
        fn on_message(&self, _topic: &str, _payload: &[u8]) {
            self.seen.fetch_add(1, Ordering::Relaxed);
            if let Some(session) = self.session.lock().take() {
                session.disconnect();
            }
        }
    }

    #[test]
    fn test_disconnect_during_dispatch() {
        let connector = Arc::new(MockConnector::default());
        let session = Arc::new(PubSubSession::new(Role::Hospital, connector.clone()));
        let handler = Arc::new(DisconnectingHandler {
            session: Mutex::new(Some(session.clone())),
            seen: AtomicU64::new(0),
        });
        session.set_message_handler(handler.clone());

        session.connect(&session_config(Role::Hospital)).unwrap();
        let delivery = connector.delivery();
        delivery.connection_result(0);

        delivery.message("smartbracelet/1/oxygen", b"Oxygen Level: 80");
        delivery.message("smartbracelet/1/oxygen", b"Oxygen Level: 81");

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(handler.seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_link_opened_after_failure_is_closed() {
        let connector = Arc::new(MockConnector {
            settle_on_open: Some(5),
            ..MockConnector::default()
        });
        let session = PubSubSession::new(Role::Hospital, connector.clone());

        session.connect(&session_config(Role::Hospital)).unwrap();

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failure_code(), Some(5));
        assert_eq!(connector.link.disconnects.load(Ordering::Relaxed), 1);
        assert!(connector.link.subscribed.lock().is_empty());
    }

    struct BlockingHandler {
        entered: std::sync::Barrier,
        release: std::sync::Barrier,
        seen: AtomicU64,
    }

    impl MessageHandler for BlockingHandler {
        fn on_message(&self, _topic: &str, _payload: &[u8]) {
            if self.seen.fetch_add(1, Ordering::Relaxed) == 0 {
                self.entered.wait();
                self.release.wait();
            }
        }
    }

    #[test]
    fn test_disconnect_from_another_thread_during_dispatch() {
        let (session, connector, listener) = session(Role::Hospital);
        let handler = Arc::new(BlockingHandler {
            entered: std::sync::Barrier::new(2),
            release: std::sync::Barrier::new(2),
            seen: AtomicU64::new(0),
        });
        session.set_message_handler(handler.clone());

        session.connect(&session_config(Role::Hospital)).unwrap();
        let delivery = connector.delivery();
        delivery.connection_result(0);

        let dispatch = {
            let delivery = delivery.clone();
            std::thread::spawn(move || {
                delivery.message("smartbracelet/1/heart_rate", b"Heart Rate: 130");
            })
        };

        handler.entered.wait();
        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.link.disconnects.load(Ordering::Relaxed), 1);

        handler.release.wait();
        dispatch.join().unwrap();

        delivery.message("smartbracelet/1/heart_rate", b"Heart Rate: 131");
        assert_eq!(handler.seen.load(Ordering::Relaxed), 1);
        assert_eq!(session.delivered_count(), 1);
        assert_eq!(listener.states.lock().last(), Some(&SessionState::Disconnected));
    }
}
