// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Topic naming for bracelet readings

use super::MetricKind;

/// Root level shared by every bracelet topic
pub const TOPIC_ROOT: &str = "smartbracelet";

/// `smartbracelet/{device_id}/{kind_suffix}`
pub fn publish_topic(device_id: &str, kind: MetricKind) -> String {
    format!("{}/{}/{}", TOPIC_ROOT, device_id, kind.topic_suffix())
}

/// Wildcard matching every device and every metric
pub fn subscription_filter() -> String {
    format!("{}/#", TOPIC_ROOT)
}
