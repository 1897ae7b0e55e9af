// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! VitalWatch - Smart-Bracelet Health Monitoring over MQTT
//!
//! Bracelets publish simulated vital signs; hospital and smartphone monitors
//! subscribe, evaluate each reading against clinical thresholds and raise an
//! emergency state, recording rising edges in an append-only event log.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────┐   ┌──────────────┐        ┌────────┐
//! │ Simulator │ → │ Codec │ → │ PubSubSession│ ─────→ │ Broker │
//! └───────────┘   └───────┘   │  (bracelet)  │        └────────┘
//!                             └──────────────┘            │
//!                                                         ↓
//! ┌──────────┐   ┌─────────────────┐   ┌───────┐   ┌──────────────┐
//! │ EventLog │ ← │ EmergencyState  │ ← │ Codec │ ← │ PubSubSession│
//! └──────────┘   │ + thresholds    │   └───────┘   │  (monitor)   │
//!                └─────────────────┘               └──────────────┘
//!                         ↓
//!                 ┌───────────────┐
//!                 │ EventBus/sink │
//!                 └───────────────┘
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod error;
pub mod monitor;
pub mod session;
pub mod vitals;

// Re-exports for convenience
pub use config::{Config, ConnectionSettings, DeviceIdentity, Role, SessionConfig};
pub use crate::core::{BraceletPublisher, EventBus};
pub use error::{Error, Result};
pub use monitor::{EmergencyMonitor, EmergencyPolicy, EmergencyState, EventLog, LogEntry};
pub use session::{MqttConnector, PubSubSession, SessionState};
pub use vitals::{MetricKind, MetricReading, ReadingSimulator, ThresholdTable};

/// VitalWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VitalWatch name
pub const NAME: &str = "VitalWatch";
