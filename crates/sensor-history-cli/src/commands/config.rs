//! Inspect or edit the persisted tunables.

use sensor_history_core::{ConfigError, ConfigStore, HistoryConfig};

pub fn run(config_dir: &str, interval: Option<u64>, time_frame: Option<u64>) {
    let store = ConfigStore::new(config_dir);
    match apply(&store, interval, time_frame) {
        Ok(cfg) => {
            println!("{}", store.path().display());
            println!("  Interval:   {}s", cfg.interval);
            println!("  TimeFrame:  {}m", cfg.time_frame);
            println!("  Capacity:   {} samples per sensor", cfg.capacity());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Load the config, apply any overrides, and persist if something changed.
fn apply(
    store: &ConfigStore,
    interval: Option<u64>,
    time_frame: Option<u64>,
) -> Result<HistoryConfig, ConfigError> {
    let current = store.load();
    let updated = HistoryConfig::new(
        interval.unwrap_or(current.interval),
        time_frame.unwrap_or(current.time_frame),
    )?;
    if updated != current {
        store.try_save(&updated)?;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_without_overrides_returns_current() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        assert_eq!(apply(&store, None, None).unwrap(), HistoryConfig::default());
    }

    #[test]
    fn test_apply_persists_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        let cfg = apply(&store, Some(5), Some(1)).unwrap();
        assert_eq!(cfg.capacity(), 12);
        assert_eq!(store.try_load().unwrap(), cfg);
    }

    #[test]
    fn test_apply_rejects_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        assert!(apply(&store, Some(0), None).is_err());
        assert_eq!(store.try_load().unwrap(), HistoryConfig::default());
    }
}
