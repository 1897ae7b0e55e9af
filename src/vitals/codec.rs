// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Text payload codec: `"<Label>: <number>"`
//!
//! The metric kind is never read from the payload. It is inferred from the
//! topic by substring match in [`MetricKind::ALL`] order, first match wins,
//! so a topic such as `smartbracelet/oxygen_sugar/heart_rate` decodes as a
//! heart-rate reading.

use crate::error::{Error, Result};

use super::MetricKind;

const SEPARATOR: &str = ": ";

/// Encode a reading as a payload string
pub fn encode(kind: MetricKind, value: f64) -> String {
    format!("{}{}{}", kind.label(), SEPARATOR, value)
}

/// Infer the metric kind from a topic
pub fn kind_from_topic(topic: &str) -> Result<MetricKind> {
    MetricKind::ALL
        .into_iter()
        .find(|kind| topic.contains(kind.topic_suffix()))
        .ok_or_else(|| Error::UnrecognizedTopic(topic.to_string()))
}

/// Decode a received message into its kind and value
pub fn decode(topic: &str, payload: &[u8]) -> Result<(MetricKind, f64)> {
    decode_with_text(topic, payload).map(|(kind, value, _)| (kind, value))
}

/// Like [`decode`], also returning the value text as received, trimmed
pub fn decode_with_text(topic: &str, payload: &[u8]) -> Result<(MetricKind, f64, String)> {
    let kind = kind_from_topic(topic)?;

    let text = std::str::from_utf8(payload)
        .map_err(|_| Error::MalformedPayload(String::from_utf8_lossy(payload).into_owned()))?;

    // The value is the segment after the first separator, up to any second one
    let number = text
        .split(SEPARATOR)
        .nth(1)
        .map(str::trim)
        .ok_or_else(|| Error::MalformedPayload(text.to_string()))?;
    let value = number
        .parse::<f64>()
        .map_err(|_| Error::MalformedPayload(text.to_string()))?;

    Ok((kind, value, number.to_string()))
}
