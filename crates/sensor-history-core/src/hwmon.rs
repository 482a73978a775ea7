//! Linux hwmon backend.
//!
//! Presents `/sys/class/hwmon` as a sensor bus. Every `*_input` attribute
//! becomes an object at
//! `/xyz/openbmc_project/sensors/<kind>/<chip>_<label>` served by
//! [`HWMON_SERVICE`] and implementing the sensor Value interface. Values are
//! reported in SI units: degrees C, volts, amps, watts, rpm.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::time::Duration;

use log::debug;

use crate::bus::{
    PropertyReader, PropertyValue, SENSOR_VALUE_INTERFACE, SensorRegistry, SubTree,
    VALUE_PROPERTY,
};
use crate::error::BusError;

/// Default sysfs root.
pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";

/// Service name reported for every hwmon object.
pub const HWMON_SERVICE: &str = "linux.hwmon";

/// Prefix of every object path.
pub const SENSOR_PATH_PREFIX: &str = "/xyz/openbmc_project/sensors";

/// Physical quantity of an hwmon attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Voltage,
    Current,
    Power,
    FanTach,
}

impl SensorKind {
    /// Classify an attribute file name such as `temp1_input`.
    pub fn from_attribute(fname: &str) -> Option<Self> {
        if !fname.ends_with("_input") {
            return None;
        }
        if fname.starts_with("temp") {
            Some(Self::Temperature)
        } else if fname.starts_with("in") {
            Some(Self::Voltage)
        } else if fname.starts_with("curr") {
            Some(Self::Current)
        } else if fname.starts_with("power") {
            Some(Self::Power)
        } else if fname.starts_with("fan") {
            Some(Self::FanTach)
        } else {
            None
        }
    }

    /// Divisor from the raw sysfs integer to SI units.
    pub fn scale(self) -> f64 {
        match self {
            Self::Temperature | Self::Voltage | Self::Current => 1000.0,
            Self::Power => 1_000_000.0,
            Self::FanTach => 1.0,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Voltage => write!(f, "voltage"),
            Self::Current => write!(f, "current"),
            Self::Power => write!(f, "power"),
            Self::FanTach => write!(f, "fan_tach"),
        }
    }
}

#[derive(Debug, Clone)]
struct Attribute {
    object_path: String,
    file: PathBuf,
    kind: SensorKind,
}

/// hwmon sysfs tree exposed as both registry and property reader.
///
/// Discovery rescans the tree and caches the attribute table; reads resolve
/// paths from that cache and only rescan on a miss. At most one reader thread
/// is outstanding per attribute file.
#[derive(Debug)]
pub struct HwmonBus {
    root: PathBuf,
    attributes: Mutex<BTreeMap<String, Attribute>>,
    pending: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Default for HwmonBus {
    fn default() -> Self {
        Self::new(DEFAULT_HWMON_ROOT)
    }
}

impl HwmonBus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            attributes: Mutex::new(BTreeMap::new()),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and replace the cached attribute table.
    fn rescan(&self) -> Result<BTreeMap<String, Attribute>, BusError> {
        let found = self.scan()?;
        *lock(&self.attributes) = found.clone();
        Ok(found)
    }

    fn resolve(&self, path: &str) -> Result<Attribute, BusError> {
        if let Some(attr) = lock(&self.attributes).get(path) {
            return Ok(attr.clone());
        }
        self.rescan()?
            .remove(path)
            .ok_or_else(|| BusError::Transport(format!("no such object {path}")))
    }

    /// Read a sysfs attribute on a helper thread, giving up after `timeout`.
    /// Some drivers block for a bus transaction on every read.
    ///
    /// While an earlier read of the same file is still stuck, fail fast with
    /// a timeout instead of stacking another thread behind it.
    fn read_with_timeout(&self, file: PathBuf, timeout: Duration) -> Result<String, BusError> {
        if !lock(&self.pending).insert(file.clone()) {
            debug!("{} still blocked from an earlier read", file.display());
            return Err(BusError::Timeout(timeout));
        }

        let (tx, rx) = mpsc::channel();
        let pending = Arc::clone(&self.pending);
        let key = file.clone();
        std::thread::Builder::new()
            .name("hwmon-read".to_string())
            .spawn(move || {
                let result = std::fs::read_to_string(&file);
                lock(&pending).remove(&file);
                let _ = tx.send(result);
            })
            .map_err(|e| {
                lock(&self.pending).remove(&key);
                BusError::Transport(format!("cannot spawn reader: {e}"))
            })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(s)) => Ok(s.trim().to_string()),
            Ok(Err(e)) => Err(BusError::Transport(e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(BusError::Timeout(timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(BusError::Transport("reader exited without a result".to_string()))
            }
        }
    }

    fn scan(&self) -> Result<BTreeMap<String, Attribute>, BusError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            BusError::Transport(format!("cannot list {}: {e}", self.root.display()))
        })?;
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut found = BTreeMap::new();
        let mut leaves = HashSet::new();
        for dir in dirs {
            let dir_name = dir
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown_hwmon")
                .to_string();
            let chip = read_trimmed(&dir.join("name"))
                .map(|s| normalize_key(&s))
                .unwrap_or_else(|| normalize_key(&dir_name));

            let Ok(files) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut names: Vec<String> = files
                .flatten()
                .filter_map(|f| f.file_name().to_str().map(str::to_string))
                .collect();
            names.sort();

            for fname in names {
                let Some(kind) = SensorKind::from_attribute(&fname) else {
                    continue;
                };
                let label = read_trimmed(&dir.join(fname.replace("_input", "_label")))
                    .map(|s| normalize_key(&s))
                    .unwrap_or_else(|| normalize_key(fname.trim_end_matches("_input")));

                // Leaves must stay unique across kinds and chips.
                let mut leaf = format!("{chip}_{label}");
                if leaves.contains(&leaf) {
                    leaf = format!("{chip}_{}_{label}", normalize_key(&dir_name));
                }
                if leaves.contains(&leaf) {
                    leaf = format!("{leaf}_{kind}");
                }
                leaves.insert(leaf.clone());
                let object_path = format!("{SENSOR_PATH_PREFIX}/{kind}/{leaf}");
                found.insert(
                    object_path.clone(),
                    Attribute {
                        object_path,
                        file: dir.join(&fname),
                        kind,
                    },
                );
            }
        }
        Ok(found)
    }
}

impl SensorRegistry for HwmonBus {
    fn get_subtree(
        &self,
        root: &str,
        depth: u32,
        interfaces: &[&str],
    ) -> Result<SubTree, BusError> {
        let mut tree = SubTree::new();
        if !interfaces.is_empty() && !interfaces.contains(&SENSOR_VALUE_INTERFACE) {
            return Ok(tree);
        }

        let prefix = root.trim_end_matches('/');
        for attr in self.rescan()?.into_values() {
            let Some(rest) = attr.object_path.strip_prefix(prefix) else {
                continue;
            };
            if !prefix.is_empty() && !rest.starts_with('/') {
                continue;
            }
            let levels = rest.split('/').filter(|s| !s.is_empty()).count();
            if depth > 0 && levels > depth as usize {
                continue;
            }
            let mut services = BTreeMap::new();
            services.insert(
                HWMON_SERVICE.to_string(),
                vec![SENSOR_VALUE_INTERFACE.to_string()],
            );
            tree.insert(attr.object_path, services);
        }
        Ok(tree)
    }
}

impl PropertyReader for HwmonBus {
    fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        timeout: Duration,
    ) -> Result<PropertyValue, BusError> {
        if service != HWMON_SERVICE {
            return Err(BusError::Transport(format!("unknown service {service}")));
        }
        if interface != SENSOR_VALUE_INTERFACE || property != VALUE_PROPERTY {
            return Err(BusError::Transport(format!(
                "{path} has no property {interface}.{property}"
            )));
        }

        let attr = self.resolve(path)?;
        let raw = self.read_with_timeout(attr.file, timeout)?;
        let value: i64 = raw
            .parse()
            .map_err(|_| BusError::MalformedReply(format!("{path}: {raw:?} is not an integer")))?;
        Ok(PropertyValue::Double(value as f64 / attr.kind.scale()))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_trimmed(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_us = false;
    for ch in raw.to_ascii_lowercase().chars() {
        let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if mapped == '_' {
            if !prev_us {
                out.push(mapped);
            }
            prev_us = true;
        } else {
            out.push(mapped);
            prev_us = false;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Two chips: coretemp with a labelled and an unlabelled temperature,
    /// and a board controller with one of every other kind.
    fn fake_tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let h0 = tmp.path().join("hwmon0");
        fs::create_dir(&h0).unwrap();
        fs::write(h0.join("name"), "coretemp\n").unwrap();
        fs::write(h0.join("temp1_input"), "45000\n").unwrap();
        fs::write(h0.join("temp1_label"), "Package id 0\n").unwrap();
        fs::write(h0.join("temp2_input"), "43500\n").unwrap();
        fs::write(h0.join("temp2_max"), "100000\n").unwrap();

        let h1 = tmp.path().join("hwmon1");
        fs::create_dir(&h1).unwrap();
        fs::write(h1.join("name"), "nct6775").unwrap();
        fs::write(h1.join("in0_input"), "1200").unwrap();
        fs::write(h1.join("curr1_input"), "500").unwrap();
        fs::write(h1.join("power1_input"), "25000000").unwrap();
        fs::write(h1.join("fan1_input"), "1500").unwrap();
        fs::write(h1.join("temp9_input"), "garbage").unwrap();
        tmp
    }

    fn read(bus: &HwmonBus, path: &str) -> Result<f64, BusError> {
        bus.get_property(
            HWMON_SERVICE,
            path,
            SENSOR_VALUE_INTERFACE,
            VALUE_PROPERTY,
            TIMEOUT,
        )
        .map(PropertyValue::as_f64)
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            SensorKind::from_attribute("temp1_input"),
            Some(SensorKind::Temperature)
        );
        assert_eq!(
            SensorKind::from_attribute("fan3_input"),
            Some(SensorKind::FanTach)
        );
        assert_eq!(SensorKind::from_attribute("temp1_max"), None);
        assert_eq!(SensorKind::from_attribute("intrusion0_alarm"), None);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Package id 0"), "package_id_0");
        assert_eq!(normalize_key("--CPU  Fan--"), "cpu_fan");
    }

    #[test]
    fn test_subtree_lists_all_inputs() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let tree = bus.get_subtree("/", 0, &[SENSOR_VALUE_INTERFACE]).unwrap();

        let paths: Vec<&str> = tree.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "/xyz/openbmc_project/sensors/current/nct6775_curr1",
                "/xyz/openbmc_project/sensors/fan_tach/nct6775_fan1",
                "/xyz/openbmc_project/sensors/power/nct6775_power1",
                "/xyz/openbmc_project/sensors/temperature/coretemp_package_id_0",
                "/xyz/openbmc_project/sensors/temperature/coretemp_temp2",
                "/xyz/openbmc_project/sensors/temperature/nct6775_temp9",
                "/xyz/openbmc_project/sensors/voltage/nct6775_in0",
            ]
        );
        for services in tree.values() {
            assert_eq!(
                services.get(HWMON_SERVICE).unwrap(),
                &vec![SENSOR_VALUE_INTERFACE.to_string()]
            );
        }
    }

    #[test]
    fn test_subtree_scoped_to_root() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let tree = bus
            .get_subtree("/xyz/openbmc_project/sensors/temperature", 0, &[])
            .unwrap();
        assert_eq!(tree.len(), 3);

        let tree = bus
            .get_subtree("/xyz/openbmc_project/sensors/temp", 0, &[])
            .unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_subtree_depth_limit() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let tree = bus.get_subtree("/xyz/openbmc_project", 1, &[]).unwrap();
        assert!(tree.is_empty());
        let tree = bus.get_subtree("/xyz/openbmc_project", 3, &[]).unwrap();
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_subtree_other_interface_is_empty() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let tree = bus
            .get_subtree("/", 0, &["xyz.openbmc_project.Inventory.Item"])
            .unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_missing_root_is_transport_error() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = HwmonBus::new(tmp.path().join("absent"));
        assert!(matches!(
            bus.get_subtree("/", 0, &[]),
            Err(BusError::Transport(_))
        ));
    }

    #[test]
    fn test_values_scaled_to_si() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let p = |s: &str| format!("{SENSOR_PATH_PREFIX}/{s}");

        assert_eq!(read(&bus, &p("temperature/coretemp_package_id_0")).unwrap(), 45.0);
        assert_eq!(read(&bus, &p("temperature/coretemp_temp2")).unwrap(), 43.5);
        assert_eq!(read(&bus, &p("voltage/nct6775_in0")).unwrap(), 1.2);
        assert_eq!(read(&bus, &p("current/nct6775_curr1")).unwrap(), 0.5);
        assert_eq!(read(&bus, &p("power/nct6775_power1")).unwrap(), 25.0);
        assert_eq!(read(&bus, &p("fan_tach/nct6775_fan1")).unwrap(), 1500.0);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let path = format!("{SENSOR_PATH_PREFIX}/temperature/nct6775_temp9");
        assert!(matches!(read(&bus, &path), Err(BusError::MalformedReply(_))));
    }

    #[test]
    fn test_unknown_object_service_or_property() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        let path = format!("{SENSOR_PATH_PREFIX}/temperature/coretemp_temp2");

        assert!(read(&bus, "/xyz/openbmc_project/sensors/temperature/none").is_err());
        assert!(
            bus.get_property("other.svc", &path, SENSOR_VALUE_INTERFACE, "Value", TIMEOUT)
                .is_err()
        );
        assert!(
            bus.get_property(HWMON_SERVICE, &path, SENSOR_VALUE_INTERFACE, "MaxValue", TIMEOUT)
                .is_err()
        );
    }

    #[test]
    fn test_duplicate_chip_names_get_distinct_paths() {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["hwmon0", "hwmon1"] {
            let d = tmp.path().join(dir);
            fs::create_dir(&d).unwrap();
            fs::write(d.join("name"), "nvme").unwrap();
            fs::write(d.join("temp1_input"), "30000").unwrap();
        }
        let bus = HwmonBus::new(tmp.path());
        let tree = bus.get_subtree("/", 0, &[]).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.contains_key("/xyz/openbmc_project/sensors/temperature/nvme_temp1"));
        assert!(tree.contains_key("/xyz/openbmc_project/sensors/temperature/nvme_hwmon1_temp1"));
    }

    #[test]
    fn test_shared_label_across_kinds_gets_distinct_leaves() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("hwmon0");
        fs::create_dir(&d).unwrap();
        fs::write(d.join("name"), "psu").unwrap();
        fs::write(d.join("in1_input"), "12000").unwrap();
        fs::write(d.join("in1_label"), "out").unwrap();
        fs::write(d.join("curr1_input"), "2000").unwrap();
        fs::write(d.join("curr1_label"), "out").unwrap();
        let bus = HwmonBus::new(tmp.path());
        let tree = bus.get_subtree("/", 0, &[]).unwrap();
        let leaves: HashSet<&str> = tree.keys().map(|p| crate::bus::leaf_name(p)).collect();
        assert_eq!(tree.len(), 2);
        assert_eq!(leaves.len(), 2);
    }

    #[test]
    fn test_reads_use_table_from_last_discovery() {
        let tmp = fake_tree();
        let bus = HwmonBus::new(tmp.path());
        bus.get_subtree("/", 0, &[]).unwrap();

        // A new chip appearing after discovery is picked up on a cache miss.
        let h2 = tmp.path().join("hwmon2");
        fs::create_dir(&h2).unwrap();
        fs::write(h2.join("name"), "acpitz").unwrap();
        fs::write(h2.join("temp1_input"), "27800").unwrap();
        let v = read(&bus, "/xyz/openbmc_project/sensors/temperature/acpitz_temp1").unwrap();
        assert!((v - 27.8).abs() < 1e-9);

        // A chip renamed after discovery keeps resolving through the cache.
        fs::write(tmp.path().join("hwmon0").join("name"), "renamed").unwrap();
        let v = read(&bus, "/xyz/openbmc_project/sensors/temperature/coretemp_temp2").unwrap();
        assert!((v - 43.5).abs() < 1e-9);
    }

    #[test]
    fn test_blocked_attribute_holds_one_reader_thread() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path().join("hwmon0");
        fs::create_dir(&d).unwrap();
        fs::write(d.join("name"), "slow").unwrap();
        let fifo = d.join("temp1_input");
        let made = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !made {
            return;
        }

        let bus = HwmonBus::new(tmp.path());
        let path = "/xyz/openbmc_project/sensors/temperature/slow_temp1";
        assert!(bus.get_subtree("/", 0, &[]).unwrap().contains_key(path));

        for _ in 0..20 {
            let err = bus
                .get_property(
                    HWMON_SERVICE,
                    path,
                    SENSOR_VALUE_INTERFACE,
                    VALUE_PROPERTY,
                    Duration::from_millis(20),
                )
                .unwrap_err();
            assert!(matches!(err, BusError::Timeout(_)));
        }
        assert_eq!(lock(&bus.pending).len(), 1);

        // Unblock the stuck reader; the slot is released once it finishes.
        fs::write(&fifo, "30000\n").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !lock(&bus.pending).is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(lock(&bus.pending).is_empty());
    }
}
