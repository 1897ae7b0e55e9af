// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Monitor module - emergency state derivation for subscriber roles

mod event_log;

pub use event_log::{EventLog, LogEntry};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::session::MessageHandler;
use crate::vitals::{decode_with_text, MetricKind, ThresholdTable, Verdict};

/// How the emergency flag is derived from the stored readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyPolicy {
    /// Only the most recently arrived reading decides the flag
    #[default]
    LatestReading,
    /// Flag stays raised while the last known reading of any kind alerts
    AnyKindAlerting,
}

/// Change of the emergency flag caused by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Flag went from inactive to active
    Raised,
    /// Flag went from active to inactive
    Cleared,
    /// Flag kept its value
    Unchanged,
}

/// Receives derived state for presentation
pub trait DisplaySink: Send + Sync {
    /// A decoded metric value arrived or was generated
    fn metric_updated(&self, kind: MetricKind, value: f64);

    /// Called after every emergency state update, not only on transitions
    fn emergency_changed(&self, snapshot: &EmergencySnapshot);
}

/// Point-in-time copy of an [`EmergencyState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencySnapshot {
    /// Emergency flag
    pub active: bool,
    /// Kind whose reading raised or holds the flag
    pub triggering_kind: Option<MetricKind>,
    /// Last values indexed by [`MetricKind::index`]
    pub readings: [Option<f64>; 4],
    /// Last values as received, same indexing
    pub display: [Option<String>; 4],
    /// Time of the last update
    pub updated_at: DateTime<Utc>,
}

impl EmergencySnapshot {
    /// Last numeric value of `kind`
    pub fn reading(&self, kind: MetricKind) -> Option<f64> {
        self.readings[kind.index()]
    }

    /// Value as displayed, `N/A` if never received
    pub fn display_value(&self, kind: MetricKind) -> String {
        self.display[kind.index()]
            .clone()
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Emergency flag and the last value seen per kind
#[derive(Debug, Clone)]
pub struct EmergencyState {
    policy: EmergencyPolicy,
    active: bool,
    triggering_kind: Option<MetricKind>,
    last_readings: [Option<f64>; 4],
    last_display: [Option<String>; 4],
    last_verdicts: [Option<Verdict>; 4],
    updated_at: DateTime<Utc>,
}

impl EmergencyState {
    /// Inactive state with no readings
    pub fn new(policy: EmergencyPolicy) -> Self {
        Self {
            policy,
            active: false,
            triggering_kind: None,
            last_readings: [None; 4],
            last_display: Default::default(),
            last_verdicts: [None; 4],
            updated_at: Utc::now(),
        }
    }

    /// Policy deriving the flag
    pub fn policy(&self) -> EmergencyPolicy {
        self.policy
    }

    /// Whether an emergency is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Kind responsible for the active flag
    pub fn triggering_kind(&self) -> Option<MetricKind> {
        self.triggering_kind
    }

    /// Last numeric value of `kind`
    pub fn last_reading(&self, kind: MetricKind) -> Option<f64> {
        self.last_readings[kind.index()]
    }

    /// Record a reading and recompute the flag
    pub fn update(&mut self, kind: MetricKind, value: f64, table: &ThresholdTable) -> Transition {
        self.update_with_text(kind, value, value.to_string(), table)
    }

    /// [`update`](Self::update) keeping the value text as it arrived for display
    pub fn update_with_text(
        &mut self,
        kind: MetricKind,
        value: f64,
        text: String,
        table: &ThresholdTable,
    ) -> Transition {
        let verdict = table.evaluate(kind, value);
        self.last_readings[kind.index()] = Some(value);
        self.last_display[kind.index()] = Some(text);
        self.last_verdicts[kind.index()] = Some(verdict);
        self.updated_at = Utc::now();

        let was_active = self.active;
        match self.policy {
            EmergencyPolicy::LatestReading => {
                self.active = verdict.is_alert();
                self.triggering_kind = self.active.then_some(kind);
            }
            EmergencyPolicy::AnyKindAlerting => {
                let alerting = |k: &MetricKind| self.last_verdicts[k.index()] == Some(Verdict::Alert);
                self.triggering_kind = if verdict.is_alert() {
                    Some(kind)
                } else {
                    MetricKind::ALL.iter().copied().find(|k| alerting(k))
                };
                self.active = self.triggering_kind.is_some();
            }
        }

        match (was_active, self.active) {
            (false, true) => Transition::Raised,
            (true, false) => Transition::Cleared,
            _ => Transition::Unchanged,
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> EmergencySnapshot {
        EmergencySnapshot {
            active: self.active,
            triggering_kind: self.triggering_kind,
            readings: self.last_readings,
            display: self.last_display.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Message handler for subscriber roles.
///
/// Runs decode, evaluation, state update, display notification and the
/// rising-edge log append synchronously on the delivery thread.
pub struct EmergencyMonitor {
    table: ThresholdTable,
    state: Mutex<EmergencyState>,
    sink: Arc<dyn DisplaySink>,
    event_log: Option<EventLog>,
    handled: AtomicU64,
    dropped: AtomicU64,
}

impl EmergencyMonitor {
    /// Monitor evaluating against `table` and reporting to `sink`
    pub fn new(table: ThresholdTable, policy: EmergencyPolicy, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            table,
            state: Mutex::new(EmergencyState::new(policy)),
            sink,
            event_log: None,
            handled: 0.into(),
            dropped: 0.into(),
        }
    }

    /// Persist an entry on every emergency rising edge
    pub fn with_event_log(mut self, event_log: EventLog) -> Self {
        self.event_log = Some(event_log);
        self
    }

    /// Configured event log, if any
    pub fn event_log(&self) -> Option<&EventLog> {
        self.event_log.as_ref()
    }

    /// Copy of the current emergency state
    pub fn snapshot(&self) -> EmergencySnapshot {
        self.state.lock().snapshot()
    }

    /// Messages applied to the state
    pub fn handled_count(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Messages dropped at decode
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Decode and apply one message
    pub fn process(&self, topic: &str, payload: &[u8]) -> Result<Transition> {
        let (kind, value, text) = decode_with_text(topic, payload)?;

        let (transition, snapshot) = {
            let mut state = self.state.lock();
            let transition = state.update_with_text(kind, value, text, &self.table);
            (transition, state.snapshot())
        };
        self.handled.fetch_add(1, Ordering::Relaxed);

        if snapshot.triggering_kind == Some(kind) {
            warn!("ALERT: {}", kind.alert_message());
        }

        self.sink.metric_updated(kind, value);
        self.sink.emergency_changed(&snapshot);

        match transition {
            Transition::Raised => {
                info!("Emergency raised by {} = {}", kind, value);
                if let Some(log) = &self.event_log {
                    log.append(&LogEntry::from_snapshot(&snapshot))?;
                }
            }
            Transition::Cleared => info!("Emergency cleared by {} = {}", kind, value),
            Transition::Unchanged => {}
        }

        Ok(transition)
    }

    /// Operator-requested log entry. Returns false when no log is configured.
    pub fn save_log(&self) -> Result<bool> {
        match &self.event_log {
            Some(log) => {
                log.append(&LogEntry::from_snapshot(&self.snapshot()))?;
                info!("Logs saved to {:?}", log.path());
                Ok(true)
            }
            None => {
                warn!("No event log configured, nothing saved");
                Ok(false)
            }
        }
    }
}

impl MessageHandler for EmergencyMonitor {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        debug!("Message received from {}: {}", topic, String::from_utf8_lossy(payload));
        match self.process(topic, payload) {
            Ok(_) => {}
            Err(e) if e.is_message_path() => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping message on {}: {}", topic, e);
            }
            Err(e) => error!("Failed to record emergency transition: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vitals::{encode, publish_topic};

    #[derive(Default)]
    struct RecordingSink {
        metrics: Mutex<Vec<(MetricKind, f64)>>,
        snapshots: Mutex<Vec<EmergencySnapshot>>,
    }

    impl DisplaySink for RecordingSink {
        fn metric_updated(&self, kind: MetricKind, value: f64) {
            self.metrics.lock().push((kind, value));
        }

        fn emergency_changed(&self, snapshot: &EmergencySnapshot) {
            self.snapshots.lock().push(snapshot.clone());
        }
    }

    fn message(kind: MetricKind, value: f64) -> (String, Vec<u8>) {
        (publish_topic("12", kind), encode(kind, value).into_bytes())
    }

    fn monitor_with_log(dir: &tempfile::TempDir) -> (EmergencyMonitor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let log = EventLog::open(dir.path().join("health_metrics_log.txt")).unwrap();
        let monitor = EmergencyMonitor::new(
            ThresholdTable::STANDARD,
            EmergencyPolicy::LatestReading,
            sink.clone(),
        )
        .with_event_log(log);
        (monitor, sink)
    }

    fn deliver(monitor: &EmergencyMonitor, kind: MetricKind, value: f64) {
        let (topic, payload) = message(kind, value);
        monitor.on_message(&topic, &payload);
    }

    fn log_text(monitor: &EmergencyMonitor) -> String {
        let path = monitor.event_log().unwrap().path();
        std::fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn test_latest_reading_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::BodyTemperature, 39.5);
        assert!(monitor.snapshot().active);

        deliver(&monitor, MetricKind::HeartRate, 70.0);
        let snapshot = monitor.snapshot();
        assert!(!snapshot.active);
        assert_eq!(snapshot.triggering_kind, None);
        assert_eq!(snapshot.reading(MetricKind::BodyTemperature), Some(39.5));
    }

    #[test]
    fn test_low_oxygen_logs_once() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::OxygenSaturation, 85.0);
        let snapshot = monitor.snapshot();
        assert!(snapshot.active);
        assert_eq!(snapshot.triggering_kind, Some(MetricKind::OxygenSaturation));
        assert_eq!(monitor.event_log().unwrap().entries_written(), 1);

        // Still active, no second rising edge
        deliver(&monitor, MetricKind::OxygenSaturation, 84.0);
        assert_eq!(monitor.event_log().unwrap().entries_written(), 1);

        let text = log_text(&monitor);
        assert_eq!(text.matches("Emergency Status: Yes").count(), 1);
        assert!(text.contains("Oxygen Level: 85\n"));
        assert!(text.contains("Heart Rate: N/A\n"));
    }

    #[test]
    fn test_malformed_payload_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, sink) = monitor_with_log(&dir);

        monitor.on_message("smartbracelet/12/heart_rate", b"Heart Rate: abc");

        let snapshot = monitor.snapshot();
        assert!(!snapshot.active);
        assert_eq!(snapshot.readings, [None; 4]);
        assert_eq!(monitor.dropped_count(), 1);
        assert_eq!(monitor.handled_count(), 0);
        assert!(sink.metrics.lock().is_empty());
        assert!(sink.snapshots.lock().is_empty());
        assert_eq!(monitor.event_log().unwrap().entries_written(), 0);
        assert!(!monitor.event_log().unwrap().path().exists());
    }

    #[test]
    fn test_unrecognized_topic_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::BloodSugar, 250.0);
        monitor.on_message("smartbracelet/12/steps", b"Steps: 1000");

        assert!(monitor.snapshot().active);
        assert_eq!(monitor.dropped_count(), 1);
    }

    #[test]
    fn test_only_latest_reading_counts() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::BodyTemperature, 37.0);
        assert!(!monitor.snapshot().active);
        deliver(&monitor, MetricKind::HeartRate, 80.0);
        assert!(!monitor.snapshot().active);
        deliver(&monitor, MetricKind::OxygenSaturation, 97.0);
        assert!(!monitor.snapshot().active);
        deliver(&monitor, MetricKind::BloodSugar, 260.0);
        assert!(monitor.snapshot().active);
        deliver(&monitor, MetricKind::BodyTemperature, 36.8);
        assert!(!monitor.snapshot().active);

        assert_eq!(monitor.snapshot().reading(MetricKind::BloodSugar), Some(260.0));
        assert_eq!(monitor.event_log().unwrap().entries_written(), 1);
    }

    #[test]
    fn test_sink_notified_on_every_update() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, sink) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::HeartRate, 70.0);
        deliver(&monitor, MetricKind::HeartRate, 72.0);
        deliver(&monitor, MetricKind::HeartRate, 130.0);

        assert_eq!(sink.snapshots.lock().len(), 3);
        assert_eq!(
            *sink.metrics.lock(),
            vec![
                (MetricKind::HeartRate, 70.0),
                (MetricKind::HeartRate, 72.0),
                (MetricKind::HeartRate, 130.0)
            ]
        );
        assert!(sink.snapshots.lock()[2].active);
    }

    #[test]
    fn test_any_kind_policy_is_sticky_until_cleared() {
        let table = ThresholdTable::STANDARD;
        let mut state = EmergencyState::new(EmergencyPolicy::AnyKindAlerting);

        assert_eq!(state.update(MetricKind::BodyTemperature, 39.5, &table), Transition::Raised);
        assert_eq!(state.update(MetricKind::HeartRate, 70.0, &table), Transition::Unchanged);
        assert!(state.is_active());
        assert_eq!(state.triggering_kind(), Some(MetricKind::BodyTemperature));

        assert_eq!(state.update(MetricKind::OxygenSaturation, 80.0, &table), Transition::Unchanged);
        assert_eq!(state.triggering_kind(), Some(MetricKind::OxygenSaturation));

        assert_eq!(state.update(MetricKind::BodyTemperature, 37.0, &table), Transition::Unchanged);
        assert_eq!(state.triggering_kind(), Some(MetricKind::OxygenSaturation));

        assert_eq!(state.update(MetricKind::OxygenSaturation, 95.0, &table), Transition::Cleared);
        assert!(!state.is_active());
    }

    #[test]
    fn test_on_demand_save() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        deliver(&monitor, MetricKind::HeartRate, 88.5);
        assert!(monitor.save_log().unwrap());

        let text = log_text(&monitor);
        assert!(text.contains("Emergency Status: No\n"));
        assert!(text.contains("Heart Rate: 88.5\n"));

        let sink = Arc::new(RecordingSink::default());
        let no_log = EmergencyMonitor::new(ThresholdTable::STANDARD, EmergencyPolicy::LatestReading, sink);
        assert!(!no_log.save_log().unwrap());
    }

    #[test]
    fn test_log_shows_value_as_received() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _) = monitor_with_log(&dir);

        monitor.on_message("smartbracelet/12/oxygen", b"Oxygen Level: 85.0");

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.reading(MetricKind::OxygenSaturation), Some(85.0));
        assert_eq!(snapshot.display_value(MetricKind::OxygenSaturation), "85.0");
        assert_eq!(snapshot.display_value(MetricKind::HeartRate), "N/A");
        assert!(log_text(&monitor).contains("Oxygen Level: 85.0\n"));
    }
}
