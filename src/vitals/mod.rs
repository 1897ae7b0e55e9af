// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Vital-sign metrics - kinds, readings, thresholds, wire codec and topics

mod threshold;
mod codec;
mod topic;
mod simulator;

pub use threshold::{evaluate, Comparison, ThresholdRule, ThresholdTable, Verdict};
pub use codec::{decode, decode_with_text, encode, kind_from_topic};
pub use topic::{publish_topic, subscription_filter, TOPIC_ROOT};
pub use simulator::ReadingSimulator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Vital-sign kinds reported by a bracelet.
///
/// Every per-kind property (wire label, unit, topic suffix, threshold rule,
/// simulated range) is an exhaustive match on this enum, so adding a kind
/// fails to compile until all of them are supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    /// Body temperature in degrees Celsius
    BodyTemperature,
    /// Heart rate in beats per minute
    HeartRate,
    /// Blood oxygen saturation in percent
    OxygenSaturation,
    /// Blood sugar in mg/dL
    BloodSugar,
}

impl MetricKind {
    /// All kinds, in topic-matching priority order
    pub const ALL: [MetricKind; 4] = [
        MetricKind::BodyTemperature,
        MetricKind::HeartRate,
        MetricKind::OxygenSaturation,
        MetricKind::BloodSugar,
    ];

    /// Last topic level used when publishing this kind
    pub fn topic_suffix(self) -> &'static str {
        match self {
            MetricKind::BodyTemperature => "body_temp",
            MetricKind::HeartRate => "heart_rate",
            MetricKind::OxygenSaturation => "oxygen",
            MetricKind::BloodSugar => "sugar",
        }
    }

    /// Human-readable label carried in the payload
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::BodyTemperature => "Body Temperature",
            MetricKind::HeartRate => "Heart Rate",
            MetricKind::OxygenSaturation => "Oxygen Level",
            MetricKind::BloodSugar => "Blood Sugar",
        }
    }

    /// Label used in event log blocks
    pub fn log_label(self) -> &'static str {
        match self {
            MetricKind::BodyTemperature => "Body Temp",
            MetricKind::HeartRate => "Heart Rate",
            MetricKind::OxygenSaturation => "Oxygen Level",
            MetricKind::BloodSugar => "Blood Sugar",
        }
    }

    /// Display unit
    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::BodyTemperature => "°C",
            MetricKind::HeartRate => "bpm",
            MetricKind::OxygenSaturation => "%",
            MetricKind::BloodSugar => "mg/dL",
        }
    }

    /// Operator-facing alert text
    pub fn alert_message(self) -> &'static str {
        match self {
            MetricKind::BodyTemperature => "Critical body temperature detected!",
            MetricKind::HeartRate => "Critical heart rate detected!",
            MetricKind::OxygenSaturation => "Low oxygen level detected!",
            MetricKind::BloodSugar => "High blood sugar level detected!",
        }
    }

    /// Plausible range produced by the simulator
    pub fn simulated_range(self) -> (f64, f64) {
        match self {
            MetricKind::BodyTemperature => (36.0, 42.0),
            MetricKind::HeartRate => (60.0, 150.0),
            MetricKind::OxygenSaturation => (85.0, 100.0),
            MetricKind::BloodSugar => (80.0, 300.0),
        }
    }

    /// Position in [`MetricKind::ALL`]
    pub fn index(self) -> usize {
        match self {
            MetricKind::BodyTemperature => 0,
            MetricKind::HeartRate => 1,
            MetricKind::OxygenSaturation => 2,
            MetricKind::BloodSugar => 3,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    /// Parses a topic suffix (`heart_rate`) or a payload label (`Heart Rate`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.topic_suffix() == s || kind.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidMetric(s.to_string()))
    }
}

/// A single vital-sign reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    /// Measured quantity
    pub kind: MetricKind,
    /// Measured value
    pub value: f64,
    /// Device id used in the topic
    pub device_id: String,
    /// Generation or decode time
    pub timestamp: DateTime<Utc>,
}

impl MetricReading {
    /// Reading stamped now
    pub fn new(kind: MetricKind, value: f64, device_id: &str) -> Self {
        Self {
            kind,
            value,
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Topic this reading is published on
    pub fn topic(&self) -> String {
        publish_topic(&self.device_id, self.kind)
    }

    /// Encoded payload
    pub fn payload(&self) -> String {
        encode(self.kind, self.value)
    }
}
