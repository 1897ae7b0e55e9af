// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Error taxonomy for the messaging and monitoring layer

use thiserror::Error;

/// Errors raised by vitalwatch components
#[derive(Debug, Error)]
pub enum Error {
    /// The transport reported a non-zero connection result code
    #[error("connection to broker failed with code {code}")]
    ConnectionFailed {
        /// CONNACK return code, or 255 for a transport failure
        code: u8,
    },

    /// Payload is not of the form `<Label>: <number>`
    #[error("malformed payload: {0:?}")]
    MalformedPayload(String),

    /// No metric kind could be inferred from the topic
    #[error("unrecognized topic: {0}")]
    UnrecognizedTopic(String),

    /// Publish or subscribe attempted outside the connected state
    #[error("session is not connected")]
    NotConnected,

    /// Metric name outside the closed set of kinds
    #[error("invalid metric: {0}")]
    InvalidMetric(String),

    /// Port text is not a number in 1..=65535
    #[error("invalid broker port: {0:?}")]
    InvalidPort(String),

    /// Broker address is neither an IP literal nor a host name
    #[error("invalid broker address: {0:?}")]
    InvalidAddress(String),

    /// Subscription filter is not a valid MQTT filter
    #[error("invalid topic filter: {0:?}")]
    InvalidTopicFilter(String),

    /// Client or device identity unusable in a topic
    #[error("invalid client identity: {0:?}")]
    InvalidIdentity(String),

    /// The transport refused an outbound request
    #[error("transport error: {0}")]
    Transport(String),

    /// Event log or file I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors on the inbound message path are absorbed and logged rather than propagated
    pub fn is_message_path(&self) -> bool {
        matches!(
            self,
            Error::MalformedPayload(_) | Error::UnrecognizedTopic(_) | Error::NotConnected
        )
    }

    /// Errors detected while validating operator input, before any connection attempt
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidPort(_)
                | Error::InvalidAddress(_)
                | Error::InvalidTopicFilter(_)
                | Error::InvalidIdentity(_)
        )
    }
}
