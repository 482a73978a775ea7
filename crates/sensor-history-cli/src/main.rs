//! CLI for sensor-history — rolling history for hardware sensors.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sensor-history")]
#[command(about = "sensor-history — keep a rolling window of hardware sensor readings")]
#[command(version = sensor_history_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector and serve the management API until Ctrl+C
    Run {
        /// Directory holding sensorreader.json
        #[arg(long, default_value = commands::DEFAULT_CONFIG_DIR)]
        config_dir: String,

        /// hwmon sysfs root to discover sensors under
        #[arg(long, default_value = sensor_history_core::DEFAULT_HWMON_ROOT)]
        hwmon_root: String,

        /// Per-sensor read timeout in milliseconds
        #[arg(long, default_value = "5000")]
        fetch_timeout_ms: u64,

        /// Port to listen on
        #[arg(long, default_value = "8043")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Discover sensors and print one reading each
    Scan {
        /// hwmon sysfs root to discover sensors under
        #[arg(long, default_value = sensor_history_core::DEFAULT_HWMON_ROOT)]
        hwmon_root: String,

        /// Per-sensor read timeout in milliseconds
        #[arg(long, default_value = "5000")]
        fetch_timeout_ms: u64,
    },

    /// Show or change the persisted interval and time-frame.
    /// A running collector picks up file edits only after a restart;
    /// use the HTTP API to retune it live.
    Config {
        /// Directory holding sensorreader.json
        #[arg(long, default_value = commands::DEFAULT_CONFIG_DIR)]
        config_dir: String,

        /// New poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// New retention window in minutes
        #[arg(long)]
        time_frame: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config_dir,
            hwmon_root,
            fetch_timeout_ms,
            port,
            host,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_dir: &config_dir,
            hwmon_root: &hwmon_root,
            fetch_timeout_ms,
            host: &host,
            port,
        }),
        Commands::Scan {
            hwmon_root,
            fetch_timeout_ms,
        } => commands::scan::run(&hwmon_root, fetch_timeout_ms),
        Commands::Config {
            config_dir,
            interval,
            time_frame,
        } => commands::config::run(&config_dir, interval, time_frame),
    }
}
