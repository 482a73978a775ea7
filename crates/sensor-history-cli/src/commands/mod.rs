pub mod config;
pub mod run;
pub mod scan;

use std::sync::Arc;
use std::time::Duration;

use sensor_history_core::HwmonBus;

/// Where the daemon keeps sensorreader.json by default.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/sensor-reader";

/// Build the hwmon bus, warning early if the root does not exist.
pub fn make_bus(hwmon_root: &str) -> Arc<HwmonBus> {
    let bus = HwmonBus::new(hwmon_root);
    if !bus.root().is_dir() {
        eprintln!("Warning: {hwmon_root} is not a directory; no sensors will be found");
    }
    Arc::new(bus)
}

/// Clamp a millisecond timeout to something a read can actually honour.
pub fn fetch_timeout(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}
