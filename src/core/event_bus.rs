// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Event bus feeding display consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::error::Error;
use crate::monitor::{DisplaySink, EmergencySnapshot};
use crate::session::{ConnectionListener, SessionState};
use crate::vitals::MetricKind;

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Metric value shown
    Metric,
    /// Emergency state update
    Emergency,
    /// Connection lifecycle change
    Connection,
    /// Reported failure
    Error,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic event id
    pub id: u64,
    /// Category of the payload
    pub event_type: EventType,
    /// Time the event was published
    pub timestamp: DateTime<Utc>,
    /// Event data
    pub payload: EventPayload,
}

/// Data carried by an [`Event`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A decoded or generated metric value
    Metric {
        /// Measured quantity
        kind: MetricKind,
        /// Measured value
        value: f64,
    },
    /// Emergency state after an update
    Emergency(EmergencySnapshot),
    /// New connection state
    Connection(SessionState),
    /// Human-readable failure
    Error {
        /// Failure description
        message: String,
    },
}

/// Fans display events out to any number of receivers.
///
/// Sends never block; with no receivers, or with a lagging receiver,
/// events are discarded rather than queued.
pub struct EventBus {
    emergency_tx: broadcast::Sender<EmergencySnapshot>,
    connection_tx: broadcast::Sender<SessionState>,
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    /// Create a bus whose channels hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (emergency_tx, _) = broadcast::channel(capacity);
        let (connection_tx, _) = broadcast::channel(capacity);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            emergency_tx,
            connection_tx,
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    /// Broadcast a metric value
    pub fn publish_metric(&self, kind: MetricKind, value: f64) {
        self.publish_event(EventType::Metric, EventPayload::Metric { kind, value });
    }

    /// Broadcast an emergency snapshot
    pub fn publish_emergency(&self, snapshot: EmergencySnapshot) {
        let _ = self.emergency_tx.send(snapshot.clone());
        self.publish_event(EventType::Emergency, EventPayload::Emergency(snapshot));
    }

    /// Broadcast a connection state
    pub fn publish_connection(&self, state: SessionState) {
        let _ = self.connection_tx.send(state);
        self.publish_event(EventType::Connection, EventPayload::Connection(state));
    }

    /// Broadcast an error message
    pub fn publish_error(&self, message: &str) {
        self.publish_event(
            EventType::Error,
            EventPayload::Error {
                message: message.to_string(),
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    /// Receive emergency snapshots only
    pub fn subscribe_emergencies(&self) -> broadcast::Receiver<EmergencySnapshot> {
        self.emergency_tx.subscribe()
    }

    /// Receive connection states only
    pub fn subscribe_connection(&self) -> broadcast::Receiver<SessionState> {
        self.connection_tx.subscribe()
    }

    /// Receive every event
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl DisplaySink for EventBus {
    fn metric_updated(&self, kind: MetricKind, value: f64) {
        self.publish_metric(kind, value);
    }

    fn emergency_changed(&self, snapshot: &EmergencySnapshot) {
        self.publish_emergency(snapshot.clone());
    }
}

impl ConnectionListener for EventBus {
    fn on_connected(&self) {}

    fn on_state_changed(&self, state: SessionState) {
        self.publish_connection(state);
    }

    fn on_connection_failed(&self, error: &Error) {
        self.publish_error(&error.to_string());
    }
}
