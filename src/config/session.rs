// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Connection settings, client identity and validated session configuration

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::vitals::subscription_filter;

/// Client role in a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes simulated vitals
    Bracelet,
    /// Hospital console, subscribes and raises the emergency banner
    Hospital,
    /// Patient smartphone, subscribes, displays readings and keeps the event log
    Smartphone,
}

impl Role {
    /// Monitors subscribe; the bracelet only publishes
    pub fn is_subscriber(self) -> bool {
        !matches!(self, Role::Bracelet)
    }

    /// Prefix of generated client identities
    pub fn client_prefix(self) -> &'static str {
        match self {
            Role::Bracelet => "IOT_client-IdBracelet",
            Role::Hospital => "HospitalClient",
            Role::Smartphone => "SmartPhoneClient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Bracelet => "bracelet",
            Role::Hospital => "hospital",
            Role::Smartphone => "smartphone",
        };
        f.write_str(name)
    }
}

/// Identity of one running client, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// `<role prefix>-<n>` with n drawn from 1..10_000_000
    pub fn generate(role: Role) -> Self {
        let n: u32 = rand::thread_rng().gen_range(1..10_000_000);
        Self(format!("{}-{}", role.client_prefix(), n))
    }

    /// Use an operator-supplied identity
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        let forbidden = |c: char| c.is_whitespace() || matches!(c, '/' | '+' | '#');
        if id.is_empty() || id.contains(forbidden) {
            return Err(Error::InvalidIdentity(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// Identity as sent to the broker
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection parameters as entered by an operator or read from the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Broker host name or IP literal
    pub broker_address: String,
    /// Broker port, kept wide so out-of-range values reach validation
    pub broker_port: i64,
    /// Overrides the generated identity
    pub client_id: Option<String>,
    pub username: String,
    /// Broker password; empty means anonymous
    pub password: String,
    /// Subscription filter for monitor roles
    pub topic_filter: String,
    /// MQTT keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            broker_address: "127.0.0.1".to_string(),
            broker_port: 1883,
            client_id: None,
            username: String::new(),
            password: String::new(),
            topic_filter: subscription_filter(),
            keep_alive_secs: 30,
        }
    }
}

impl ConnectionSettings {
    /// Set the port from operator text
    pub fn set_port_text(&mut self, text: &str) -> Result<()> {
        let port: i64 = text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPort(text.to_string()))?;
        self.broker_port = i64::from(check_port(port)?);
        Ok(())
    }

    /// Validate into a [`SessionConfig`]; the configured client id wins over `identity`
    pub fn validate(&self, identity: DeviceIdentity) -> Result<SessionConfig> {
        let broker_port = check_port(self.broker_port)?;
        let broker_address = check_address(&self.broker_address)?;
        check_topic_filter(&self.topic_filter)?;

        let identity = match &self.client_id {
            Some(id) => DeviceIdentity::new(id)?,
            None => identity,
        };

        Ok(SessionConfig {
            broker_address,
            broker_port,
            identity,
            username: self.username.clone(),
            password: SecretString::new(self.password.clone()),
            topic_filter: self.topic_filter.clone(),
            keep_alive: Duration::from_secs(self.keep_alive_secs.max(5)),
        })
    }
}

/// Validated connection parameters handed to the session
pub struct SessionConfig {
    broker_address: String,
    broker_port: u16,
    identity: DeviceIdentity,
    username: String,
    password: SecretString,
    topic_filter: String,
    keep_alive: Duration,
}

impl SessionConfig {
    /// Validated broker host
    pub fn broker_address(&self) -> &str {
        &self.broker_address
    }

    /// Validated broker port
    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    /// Client identity for this process
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Validated subscription filter
    pub fn topic_filter(&self) -> &str {
        &self.topic_filter
    }

    /// Keep-alive interval
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Username and password, if a username was given
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((&self.username, self.password.expose_secret().as_str()))
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("broker_address", &self.broker_address)
            .field("broker_port", &self.broker_port)
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("topic_filter", &self.topic_filter)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

fn check_port(port: i64) -> Result<u16> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| Error::InvalidPort(port.to_string()))
}

/// IP literal or RFC 1123 hostname. All-numeric dotted names must be IPs.
fn check_address(address: &str) -> Result<String> {
    let address = address.trim();
    let invalid = || Error::InvalidAddress(address.to_string());

    if address.parse::<IpAddr>().is_ok() {
        return Ok(address.to_string());
    }
    if address.is_empty() || address.len() > 253 {
        return Err(invalid());
    }

    let labels: Vec<&str> = address.split('.').collect();
    let label_ok = |label: &&str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !labels.iter().all(label_ok) {
        return Err(invalid());
    }
    if labels.iter().all(|l| l.chars().all(|c| c.is_ascii_digit())) {
        return Err(invalid());
    }
    Ok(address.to_string())
}

/// MQTT filter rules: `#` only as the whole last level, `+` only as a whole level
fn check_topic_filter(filter: &str) -> Result<()> {
    let invalid = || Error::InvalidTopicFilter(filter.to_string());
    if filter.is_empty() || filter.contains('\0') {
        return Err(invalid());
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Err(invalid());
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid());
        }
    }
    Ok(())
}
