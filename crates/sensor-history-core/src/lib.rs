//! # sensor-history-core
//!
//! **Rolling history for hardware sensors that only publish their latest value.**
//!
//! A background worker periodically discovers every sensor implementing the
//! `xyz.openbmc_project.Sensor.Value` interface, reads each one, and keeps a
//! bounded, oldest-first window of `(timestamp, value)` samples per sensor.
//! Management callers can read a sensor's window and retune the poll
//! interval and retention time-frame while the worker runs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sensor_history_core::{ConfigStore, HistoryEngine, HistoryService, HwmonBus};
//!
//! let bus = Arc::new(HwmonBus::default());
//! let engine = HistoryEngine::new(ConfigStore::new("/etc/sensor-reader"), bus.clone(), bus);
//! engine.start().unwrap();
//!
//! // ...later
//! for (ts, value) in engine.read("coretemp_package_id_0") {
//!     println!("{ts} {value}");
//! }
//! engine.stop();
//! ```
//!
//! ## Architecture
//!
//! Registry → discovery → fetch → HistoryStore (append + FIFO trim) → read
//!
//! Retention is `floor(time_frame * 60 / interval)` samples per sensor,
//! recomputed from the live tunables on every trim. The tunables persist as
//! JSON in a configurable directory and survive restarts.
//!
//! The bus is abstracted by [`SensorRegistry`] and [`PropertyReader`];
//! [`HwmonBus`] implements both over Linux `/sys/class/hwmon`.

pub mod bus;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod history;
pub mod hwmon;

pub use bus::{
    DEFAULT_FETCH_TIMEOUT, PropertyReader, PropertyValue, SENSOR_VALUE_INTERFACE,
    SensorDescriptor, SensorRegistry, SubTree, VALUE_PROPERTY, leaf_name,
};
pub use config::{
    CONFIG_FILE, ConfigStore, DEFAULT_INTERVAL_SECS, DEFAULT_TIME_FRAME_MINS, HistoryConfig,
};
pub use discovery::{descriptors, discover};
pub use engine::{EngineOptions, HistoryEngine, HistoryService};
pub use error::{BusError, ConfigError};
pub use fetch::{FALLBACK_VALUE, fetch};
pub use history::{HistoryStore, Sample, SensorHistory};
pub use hwmon::{DEFAULT_HWMON_ROOT, HWMON_SERVICE, HwmonBus, SensorKind};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
