//! History engine: the background polling loop and the management surface.
//!
//! Architecture:
//! 1. Capture one timestamp for the tick
//! 2. Discover every sensor implementing the Value interface
//! 3. Fetch each value (bounded, degraded to 0.0 on failure)
//! 4. Append under the sensor's leaf name and trim to the live capacity
//! 5. Sleep for the live interval, checking the stop flag while asleep
//!
//! The history map and the tunables are each behind a `Mutex`, so the worker
//! and management callers never observe a half-applied update. No lock is
//! held across a bus call.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::bus::{
    DEFAULT_FETCH_TIMEOUT, PropertyReader, SENSOR_VALUE_INTERFACE, SensorRegistry, VALUE_PROPERTY,
};
use crate::config::{ConfigStore, HistoryConfig};
use crate::discovery::{descriptors, discover};
use crate::error::{ConfigError, Result};
use crate::fetch::fetch;
use crate::history::{HistoryStore, Sample};

/// Granularity of the stop-flag check during the inter-tick sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Management contract exposed to bindings (HTTP, bus, CLI).
pub trait HistoryService: Send + Sync {
    /// Poll interval in seconds.
    fn interval(&self) -> u64;

    /// Change the poll interval. Returns the value now in effect.
    fn set_interval(&self, value: u64) -> Result<u64>;

    /// Retention window in minutes.
    fn time_frame(&self) -> u64;

    /// Change the retention window. Returns the value now in effect.
    fn set_time_frame(&self, value: u64) -> Result<u64>;

    /// Retained samples for `name`, keyed by timestamp. Empty if unknown.
    fn read(&self, name: &str) -> BTreeMap<u64, f64>;

    /// Sensors observed so far.
    fn sensor_names(&self) -> Vec<String>;
}

/// Tuning that is fixed for the engine's lifetime.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Deadline for each property read.
    pub fetch_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

struct Shared {
    registry: Arc<dyn SensorRegistry>,
    reader: Arc<dyn PropertyReader>,
    store: ConfigStore,
    options: EngineOptions,
    config: Mutex<HistoryConfig>,
    history: Mutex<HistoryStore>,
    running: AtomicBool,
}

/// Thread-safe sensor history engine.
pub struct HistoryEngine {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryEngine {
    /// Create a stopped engine. The persisted config is loaded (and healed)
    /// immediately.
    pub fn new(
        store: ConfigStore,
        registry: Arc<dyn SensorRegistry>,
        reader: Arc<dyn PropertyReader>,
    ) -> Self {
        Self::with_options(store, registry, reader, EngineOptions::default())
    }

    pub fn with_options(
        store: ConfigStore,
        registry: Arc<dyn SensorRegistry>,
        reader: Arc<dyn PropertyReader>,
        options: EngineOptions,
    ) -> Self {
        let config = store.load();
        Self {
            shared: Arc::new(Shared {
                registry,
                reader,
                store,
                options,
                config: Mutex::new(config),
                history: Mutex::new(HistoryStore::new()),
                running: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the polling worker. No-op if it is already running.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        if let Some(dead) = worker.take() {
            if dead.join().is_err() {
                warn!("sensor history worker panicked; restarting");
            }
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("sensor-history".to_string())
            .spawn(move || shared.run())
            .inspect_err(|_| self.shared.running.store(false, Ordering::SeqCst))?;
        *worker = Some(handle);

        let cfg = self.config();
        info!(
            "sensor history started interval={}s time_frame={}m capacity={}",
            cfg.interval,
            cfg.time_frame,
            cfg.capacity()
        );
        Ok(())
    }

    /// Signal the worker and wait for it to exit.
    ///
    /// An in-flight fetch is not interrupted, so this can block for up to one
    /// fetch timeout.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("sensor history worker panicked");
            }
            info!("sensor history stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Run one discovery/fetch/append pass now, stamped with the current time.
    /// Returns the number of sensors recorded.
    pub fn tick(&self) -> usize {
        self.shared.tick_at(unix_secs_now())
    }

    /// Run one pass with a caller-supplied timestamp.
    pub fn tick_at(&self, timestamp: u64) -> usize {
        self.shared.tick_at(timestamp)
    }

    /// Current tunables.
    pub fn config(&self) -> HistoryConfig {
        *lock(&self.shared.config)
    }

    /// Samples retained per sensor under the current tunables.
    pub fn capacity(&self) -> usize {
        self.config().capacity()
    }

    /// Retained samples for `name`, oldest first.
    pub fn samples(&self, name: &str) -> Vec<Sample> {
        lock(&self.shared.history).read(name)
    }

    /// Where the tunables are persisted.
    pub fn config_store(&self) -> &ConfigStore {
        &self.shared.store
    }

    fn update_config(
        &self,
        value: u64,
        field: &'static str,
        apply: impl FnOnce(&mut HistoryConfig) -> &mut u64,
    ) -> Result<u64> {
        if value == 0 {
            return Err(ConfigError::InvalidValue { field });
        }

        let mut cfg = lock(&self.shared.config);
        let slot = apply(&mut *cfg);
        if *slot == value {
            return Ok(value);
        }
        *slot = value;
        // Persisted under the lock so the file always matches memory.
        self.shared.store.save(&cfg);
        info!("{field} set to {value}, capacity now {}", cfg.capacity());
        Ok(value)
    }
}

impl HistoryService for HistoryEngine {
    fn interval(&self) -> u64 {
        self.config().interval
    }

    fn set_interval(&self, value: u64) -> Result<u64> {
        self.update_config(value, "interval", |c| &mut c.interval)
    }

    fn time_frame(&self) -> u64 {
        self.config().time_frame
    }

    fn set_time_frame(&self, value: u64) -> Result<u64> {
        self.update_config(value, "time_frame", |c| &mut c.time_frame)
    }

    fn read(&self, name: &str) -> BTreeMap<u64, f64> {
        lock(&self.shared.history).read_map(name)
    }

    fn sensor_names(&self) -> Vec<String> {
        lock(&self.shared.history).names()
    }
}

impl Drop for HistoryEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn run(&self) {
        // Cleared however the loop exits, so `is_running` tracks the thread.
        let _running = RunningGuard(&self.running);
        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            let n = self.tick_at(unix_secs_now());
            debug!("tick recorded {n} sensors");
            self.sleep_until_next_tick(started);
        }
    }

    /// Sleep until one live interval has passed since `started`.
    ///
    /// The interval is re-read on every slice so a retune takes effect
    /// without waiting out the old value.
    fn sleep_until_next_tick(&self, started: Instant) {
        while self.running.load(Ordering::SeqCst) {
            let interval = Duration::from_secs(lock(&self.config).interval);
            let remaining = interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }

    fn tick_at(&self, timestamp: u64) -> usize {
        let sensors = descriptors(discover(self.registry.as_ref()));
        let mut recorded = 0;

        for sensor in &sensors {
            let value = fetch(
                self.reader.as_ref(),
                &sensor.service,
                &sensor.path,
                SENSOR_VALUE_INTERFACE,
                VALUE_PROPERTY,
                self.options.fetch_timeout,
            );
            let capacity = lock(&self.config).capacity();

            let name = sensor.leaf_name();
            let mut history = lock(&self.history);
            history.append_from(name, &sensor.path, timestamp, value);
            history.trim(name, capacity);
            recorded += 1;
        }
        recorded
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unix_secs_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
