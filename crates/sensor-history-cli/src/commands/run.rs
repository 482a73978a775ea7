//! Collector daemon with HTTP management API.

use std::sync::Arc;

use tokio::sync::Notify;

use sensor_history_core::{ConfigStore, EngineOptions, HistoryEngine};

pub struct RunCommandConfig<'a> {
    pub config_dir: &'a str,
    pub hwmon_root: &'a str,
    pub fetch_timeout_ms: u64,
    pub host: &'a str,
    pub port: u16,
}

pub fn run(cfg: RunCommandConfig<'_>) {
    let bus = super::make_bus(cfg.hwmon_root);
    let engine = Arc::new(HistoryEngine::with_options(
        ConfigStore::new(cfg.config_dir),
        bus.clone(),
        bus,
        EngineOptions {
            fetch_timeout: super::fetch_timeout(cfg.fetch_timeout_ms),
        },
    ));

    if let Err(e) = engine.start() {
        eprintln!("Error starting collector: {e}");
        std::process::exit(1);
    }

    let tunables = engine.config();
    let base = format!("http://{}:{}", cfg.host, cfg.port);
    println!("Sensor History v{}", sensor_history_core::VERSION);
    println!("   {base}");
    println!(
        "   interval {}s, time-frame {}m ({} samples per sensor)",
        tunables.interval,
        tunables.time_frame,
        tunables.capacity()
    );
    println!("   config: {}", engine.config_store().path().display());
    println!("   hwmon:  {}", cfg.hwmon_root);
    println!();
    println!("   Endpoints:");
    println!("     GET /                        API index");
    println!("     GET|PUT /interval            Poll interval (seconds)");
    println!("     GET|PUT /time-frame          Retention window (minutes)");
    println!("     GET /sensors                 Sensors observed so far");
    println!("     GET /sensors/<name>/history  Retained samples");
    println!();
    println!("   Examples:");
    println!("     curl {base}/sensors");
    println!("     curl -X PUT -H 'content-type: application/json' -d '{{\"value\":5}}' {base}/interval");
    println!();

    // Set up Ctrl+C handler
    let stop = Arc::new(Notify::new());
    let signal = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || signal.notify_one()) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        engine.stop();
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error creating async runtime: {e}");
            engine.stop();
            std::process::exit(1);
        }
    };

    let service = engine.clone();
    let result = rt.block_on(sensor_history_server::run_server(
        service,
        cfg.host,
        cfg.port,
        async move { stop.notified().await },
    ));

    log::info!("shutting down");
    engine.stop();

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
