//! Sensor bus boundary.
//!
//! The engine talks to the platform through two traits: a
//! [`SensorRegistry`] that enumerates objects implementing an interface,
//! and a [`PropertyReader`] that reads one property of one object. Both
//! return explicit [`BusError`]s; the degrade-and-log policy lives in
//! [`crate::discovery`] and [`crate::fetch`], not in the backends.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::BusError;

/// Interface every telemetry sensor implements.
pub const SENSOR_VALUE_INTERFACE: &str = "xyz.openbmc_project.Sensor.Value";

/// Property holding the current reading.
pub const VALUE_PROPERTY: &str = "Value";

/// Default deadline for one property read.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Full object path of a sensor, e.g. `/xyz/openbmc_project/sensors/temperature/cpu0`.
pub type SensorPath = String;
/// Bus name of the service hosting an object.
pub type Service = String;
/// Interface name.
pub type Interface = String;

/// Registry reply: path → (service → interfaces).
pub type SubTree = BTreeMap<SensorPath, BTreeMap<Service, Vec<Interface>>>;

/// Raw property payload. Sensors publish either integers or doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
}

impl PropertyValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Double(v) => v,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// One discovered sensor. Transient: lives only within a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub path: SensorPath,
    pub service: Service,
    pub interfaces: Vec<Interface>,
}

impl SensorDescriptor {
    /// History key: the path segment after the last `/`.
    pub fn leaf_name(&self) -> &str {
        leaf_name(&self.path)
    }
}

/// Trailing segment of an object path.
pub fn leaf_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Enumerates objects on the bus.
pub trait SensorRegistry: Send + Sync {
    /// All objects below `root` implementing any of `interfaces`.
    /// `depth == 0` means unbounded.
    fn get_subtree(
        &self,
        root: &str,
        depth: u32,
        interfaces: &[&str],
    ) -> Result<SubTree, BusError>;
}

/// Reads a single property of a bus object.
pub trait PropertyReader: Send + Sync {
    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        timeout: Duration,
    ) -> Result<PropertyValue, BusError>;
}
