// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Bracelet vitals simulator for demo/testing

use rand::prelude::*;
use rand_distr::Uniform;

use super::{MetricKind, MetricReading};

/// Generates plausible random vitals for one bracelet
pub struct ReadingSimulator {
    device_id: String,
    rng: StdRng,
    sequence: u64,
}

impl ReadingSimulator {
    /// Simulator seeded from entropy
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            rng: StdRng::from_entropy(),
            sequence: 0,
        }
    }

    /// Deterministic simulator for reproducible runs
    pub fn seeded(device_id: &str, seed: u64) -> Self {
        Self {
            device_id: device_id.to_string(),
            rng: StdRng::seed_from_u64(seed),
            sequence: 0,
        }
    }

    /// Device id stamped on readings
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Number of batches generated so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// One value for `kind`, uniform over its range and rounded to 2 decimals
    pub fn sample(&mut self, kind: MetricKind) -> f64 {
        let (low, high) = kind.simulated_range();
        let value = self.rng.sample(Uniform::new_inclusive(low, high));
        (value * 100.0).round() / 100.0
    }

    /// One reading per kind, in publish order
    pub fn next_batch(&mut self) -> Vec<MetricReading> {
        self.sequence += 1;
        MetricKind::ALL
            .into_iter()
            .map(|kind| {
                let value = self.sample(kind);
                MetricReading::new(kind, value, &self.device_id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_covers_every_kind_in_order() {
        let mut sim = ReadingSimulator::seeded("9", 1);
        let batch = sim.next_batch();
        let kinds: Vec<_> = batch.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, MetricKind::ALL.to_vec());
        assert!(batch.iter().all(|r| r.device_id == "9"));
        assert_eq!(sim.sequence(), 1);
    }

    #[test]
    fn test_values_in_range_and_rounded() {
        let mut sim = ReadingSimulator::seeded("9", 42);
        for _ in 0..500 {
            for reading in sim.next_batch() {
                let (low, high) = reading.kind.simulated_range();
                assert!(reading.value >= low && reading.value <= high);
                let cents = reading.value * 100.0;
                assert!((cents - cents.round()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = ReadingSimulator::seeded("1", 7);
        let mut b = ReadingSimulator::seeded("1", 7);
        let va: Vec<f64> = a.next_batch().iter().map(|r| r.value).collect();
        let vb: Vec<f64> = b.next_batch().iter().map(|r| r.value).collect();
        assert_eq!(va, vb);
    }
}
