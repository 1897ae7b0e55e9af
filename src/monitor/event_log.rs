// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Append-only emergency event log

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::Result;
use crate::vitals::MetricKind;

use super::EmergencySnapshot;

/// Field order of a block after the timestamp and status lines
const LOG_ORDER: [MetricKind; 4] = [
    MetricKind::HeartRate,
    MetricKind::BodyTemperature,
    MetricKind::OxygenSaturation,
    MetricKind::BloodSugar,
];

/// One logged block
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Local time the entry was created
    pub timestamp: DateTime<Local>,
    /// Emergency flag at that time
    pub emergency_active: bool,
    /// Last values as displayed, indexed by [`MetricKind::index`]
    pub values: [Option<String>; 4],
}

impl LogEntry {
    /// Entry for the state in `snapshot`, stamped now
    pub fn from_snapshot(snapshot: &EmergencySnapshot) -> Self {
        Self {
            timestamp: Local::now(),
            emergency_active: snapshot.active,
            values: snapshot.display.clone(),
        }
    }

    /// Multi-line block terminated by a blank line
    pub fn render(&self) -> String {
        let mut block = format!(
            "{}\nEmergency Status: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            if self.emergency_active { "Yes" } else { "No" },
        );
        for kind in LOG_ORDER {
            let value = self.values[kind.index()].as_deref().unwrap_or("N/A");
            block.push_str(&format!("{}: {}\n", kind.log_label(), value));
        }
        block.push('\n');
        block
    }
}

/// Append-only text log. The file is created on the first append and every
/// append is flushed before returning.
pub struct EventLog {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    entries: AtomicU64,
}

impl EventLog {
    /// Prepare a log at `path`, creating parent directories. The file itself is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(None),
            entries: AtomicU64::new(0),
        })
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries appended through this handle
    pub fn entries_written(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Append one entry and flush it
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut writer_lock = self.writer.lock();

        if writer_lock.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            *writer_lock = Some(BufWriter::new(file));
        }

        if let Some(ref mut writer) = *writer_lock {
            writer.write_all(entry.render().as_bytes())?;
            writer.flush()?;
        }

        let count = self.entries.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Appended event log entry {} to {:?}", count, self.path);
        Ok(())
    }

    /// Flush buffered output
    pub fn flush(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
