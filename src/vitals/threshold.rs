// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Clinical threshold rules

use serde::{Deserialize, Serialize};

use super::MetricKind;

/// Direction of a threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// Alert when value is strictly greater than the bound
    Above,
    /// Alert when value is strictly less than the bound
    Below,
}

/// One comparison operator and bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Direction of the check
    pub comparison: Comparison,
    /// Limit, exclusive
    pub bound: f64,
}

impl ThresholdRule {
    /// Alert when the value is strictly past the bound
    pub fn check(&self, value: f64) -> Verdict {
        // NaN compares false both ways and never alerts
        let alert = match self.comparison {
            Comparison::Above => value > self.bound,
            Comparison::Below => value < self.bound,
        };
        if alert {
            Verdict::Alert
        } else {
            Verdict::Normal
        }
    }
}

/// Outcome of evaluating a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Within limits
    Normal,
    /// Past the threshold
    Alert,
}

impl Verdict {
    /// Whether this verdict is an alert
    pub fn is_alert(self) -> bool {
        self == Verdict::Alert
    }
}

/// Per-kind threshold bounds. Comparison direction is fixed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    /// Body temperature ceiling in °C
    pub body_temperature: f64,
    /// Heart rate ceiling in bpm
    pub heart_rate: f64,
    /// Oxygen saturation floor in %
    pub oxygen_saturation: f64,
    /// Blood sugar ceiling in mg/dL
    pub blood_sugar: f64,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl ThresholdTable {
    /// Clinical defaults
    pub const STANDARD: ThresholdTable = ThresholdTable {
        body_temperature: 39.0,
        heart_rate: 120.0,
        oxygen_saturation: 90.0,
        blood_sugar: 200.0,
    };

    /// Rule for `kind`
    pub fn rule(&self, kind: MetricKind) -> ThresholdRule {
        match kind {
            MetricKind::BodyTemperature => ThresholdRule {
                comparison: Comparison::Above,
                bound: self.body_temperature,
            },
            MetricKind::HeartRate => ThresholdRule {
                comparison: Comparison::Above,
                bound: self.heart_rate,
            },
            MetricKind::OxygenSaturation => ThresholdRule {
                comparison: Comparison::Below,
                bound: self.oxygen_saturation,
            },
            MetricKind::BloodSugar => ThresholdRule {
                comparison: Comparison::Above,
                bound: self.blood_sugar,
            },
        }
    }

    /// Evaluate `value` for `kind`
    pub fn evaluate(&self, kind: MetricKind, value: f64) -> Verdict {
        self.rule(kind).check(value)
    }
}

/// Evaluate a reading against the standard clinical thresholds
pub fn evaluate(kind: MetricKind, value: f64) -> Verdict {
    ThresholdTable::STANDARD.evaluate(kind, value)
}
