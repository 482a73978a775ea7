//! Bounded per-sensor sample history.
//!
//! Each sensor keeps an oldest-first queue of `(timestamp, value)` samples.
//! Trimming is strict FIFO: the oldest samples go first, regardless of
//! value or how often they were read.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use log::warn;
use serde::{Deserialize, Serialize};

/// One reading. `timestamp` is whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: u64,
    pub value: f64,
}

/// Samples for one sensor, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SensorHistory {
    /// Full path of the sensor that first claimed this leaf name.
    path: String,
    samples: VecDeque<Sample>,
}

impl SensorHistory {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Map from sensor leaf name to its history.
#[derive(Debug, Default)]
pub struct HistoryStore {
    sensors: HashMap<String, SensorHistory>,
    /// Leaf names already reported as shared by distinct paths.
    collisions: HashSet<String>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, creating the sensor's history on first sight.
    pub fn append(&mut self, name: &str, timestamp: u64, value: f64) {
        self.append_from(name, "", timestamp, value);
    }

    /// Like [`append`](Self::append), remembering the full path the sample
    /// came from. A second path sharing the same leaf name is merged into the
    /// same history and reported once.
    pub fn append_from(&mut self, name: &str, path: &str, timestamp: u64, value: f64) {
        let history = self
            .sensors
            .entry(name.to_string())
            .or_insert_with(|| SensorHistory {
                path: path.to_string(),
                samples: VecDeque::new(),
            });

        if history.path.is_empty() {
            history.path = path.to_string();
        } else if !path.is_empty()
            && history.path != path
            && self.collisions.insert(name.to_string())
        {
            warn!(
                "sensor name {name} is shared by {} and {path}; their samples are merged",
                history.path
            );
        }

        history.samples.push_back(Sample { timestamp, value });
    }

    /// Drop the oldest samples until at most `capacity` remain.
    /// Returns how many were evicted.
    pub fn trim(&mut self, name: &str, capacity: usize) -> usize {
        let Some(history) = self.sensors.get_mut(name) else {
            return 0;
        };
        let capacity = capacity.max(1);
        let excess = history.samples.len().saturating_sub(capacity);
        history.samples.drain(..excess);
        excess
    }

    /// Copy of the sensor's samples, oldest first. Empty if never observed.
    pub fn read(&self, name: &str) -> Vec<Sample> {
        self.sensors
            .get(name)
            .map(|h| h.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of the sensor's samples keyed by timestamp.
    ///
    /// Samples sharing a timestamp collapse to the most recent one.
    pub fn read_map(&self, name: &str) -> BTreeMap<u64, f64> {
        self.read(name)
            .into_iter()
            .map(|s| (s.timestamp, s.value))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&SensorHistory> {
        self.sensors.get(name)
    }

    /// Sensor names seen so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sensors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Total samples held across all sensors.
    pub fn total_samples(&self) -> usize {
        self.sensors.values().map(SensorHistory::len).sum()
    }
}
