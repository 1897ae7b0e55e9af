// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Periodic bracelet publisher

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::monitor::DisplaySink;
use crate::session::PubSubSession;
use crate::vitals::{MetricReading, ReadingSimulator};

/// Generates a batch of vitals per tick and publishes each reading on its topic
pub struct BraceletPublisher {
    session: Arc<PubSubSession>,
    simulator: Mutex<ReadingSimulator>,
    sink: Option<Arc<dyn DisplaySink>>,
}

impl BraceletPublisher {
    /// Publish readings from `simulator` through `session`
    pub fn new(session: Arc<PubSubSession>, simulator: ReadingSimulator) -> Self {
        Self {
            session,
            simulator: Mutex::new(simulator),
            sink: None,
        }
    }

    /// Show generated values locally, whether or not they reach the bus
    pub fn with_sink(mut self, sink: Arc<dyn DisplaySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Generate and publish one batch. Readings are dropped by the session
    /// while it is not connected.
    pub fn tick(&self) -> Vec<MetricReading> {
        let batch = self.simulator.lock().next_batch();

        for reading in &batch {
            if let Some(sink) = &self.sink {
                sink.metric_updated(reading.kind, reading.value);
            }
            self.session.publish(&reading.topic(), &reading.payload());
        }

        debug!("Bracelet tick produced {} readings", batch.len());
        batch
    }

    /// Tick every `period` until the returned task is aborted
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }
}
