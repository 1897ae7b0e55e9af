// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module

mod session;

pub use session::{ConnectionSettings, DeviceIdentity, Role, SessionConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::monitor::EmergencyPolicy;
use crate::vitals::ThresholdTable;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level
    pub log_level: String,

    /// Broker connection settings
    pub connection: ConnectionSettings,

    /// Bracelet (publisher) settings
    pub bracelet: BraceletConfig,

    /// Monitor (subscriber) settings
    pub monitor: MonitorConfig,

    /// Clinical thresholds
    pub thresholds: ThresholdTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            connection: ConnectionSettings::default(),
            bracelet: BraceletConfig::default(),
            monitor: MonitorConfig::default(),
            thresholds: ThresholdTable::default(),
        }
    }
}

impl Config {
    /// Filter directive for the log subscriber; command-line flags win over the file
    pub fn log_directive(&self, debug: bool, trace: bool) -> &str {
        if trace {
            "trace"
        } else if debug {
            "debug"
        } else {
            self.log_level.as_str()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("vitalwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Bracelet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BraceletConfig {
    /// Period between published batches in milliseconds
    pub publish_interval_ms: u64,

    /// Device id embedded in topics; defaults to the client identity
    pub device_id: Option<String>,
}

impl Default for BraceletConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 5000,
            device_id: None,
        }
    }
}

impl BraceletConfig {
    /// Publish period, never zero
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms.max(1))
    }

    /// Topic-level device id: the configured one, checked like an identity,
    /// or the client identity itself
    pub fn resolve_device_id(
        &self,
        identity: &DeviceIdentity,
    ) -> crate::error::Result<DeviceIdentity> {
        match &self.device_id {
            Some(id) => DeviceIdentity::new(id),
            None => Ok(identity.clone()),
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Append-only event log file
    pub event_log_path: PathBuf,

    /// How the emergency flag is derived from readings
    pub emergency_policy: EmergencyPolicy,

    /// Log on emergency rising edge; role default when unset
    pub log_on_emergency: Option<bool>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_log_path: PathBuf::from("health_metrics_log.txt"),
            emergency_policy: EmergencyPolicy::default(),
            log_on_emergency: None,
        }
    }
}

impl MonitorConfig {
    /// Whether `role` appends to the event log on emergencies
    pub fn logs_emergencies(&self, role: Role) -> bool {
        self.log_on_emergency.unwrap_or(role == Role::Smartphone)
    }
}
