//! Serial sensor logger.
//!
//! Reads newline-terminated numeric readings from a serial device, appends
//! each one to `log_raw.txt`, writes hourly and daily averages to
//! `log_hour.txt` and `log_day.txt`, and prunes the logs by age once an hour.
//!
//! ```text
//! sensor-logger /dev/ttyUSB0
//! sensor-logger COM3 --log-dir D:\logs
//! RUST_LOG=debug sensor-logger /dev/ttyACM0 --config logger.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use sensor_logger::clock::SystemClock;
use sensor_logger::config::LoggerConfig;
use sensor_logger::sampling::SamplingLoop;
use sensor_logger::sensors::SerialPort;

#[derive(Debug, Parser)]
#[command(version, about = "Log serial sensor readings with hourly and daily averages")]
struct Cli {
    /// Serial device to read from, e.g. /dev/ttyUSB0 or COM3
    device: String,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the log files (overrides the config file)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Line speed (overrides the config file)
    #[arg(long)]
    baud: Option<u32>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match LoggerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::from(1);
            }
        },
        None => LoggerConfig::default(),
    };
    if let Some(dir) = cli.log_dir {
        config.log_dir = dir;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        warn!("Cannot create {}: {e}", config.log_dir.display());
    }

    info!("connecting to {}", cli.device);
    let port = match SerialPort::open(&cli.device, config.baud_rate) {
        Ok(port) => port,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };
    info!("started");

    let mut sampler = SamplingLoop::new(port, SystemClock, &config);
    sampler.run()
}
