//! # UPSplus Logger
//!
//! Log battery discharge profiles from a GeeekPi UPS Plus v5 over I2C.
//!
//! # Usage
//!
//! ```text
//! upsplus-logger [--config FILE]            start a logging session
//! upsplus-logger RECORD_FILE "LABEL"        summarise a finished session
//! ```
//!
//! Run a session right after booting from a full charge to capture the whole
//! discharge curve. Mounting the root filesystem read-only (overlay FS) keeps
//! the SD card safe when the battery finally gives out; point the output
//! directory at storage that survives the power cut.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use upsplus_logger::bus::I2cBus;
use upsplus_logger::config::Config;
use upsplus_logger::registers::RegisterMap;
use upsplus_logger::report::DischargeReport;
use upsplus_logger::sampler::Sampler;
use upsplus_logger::sampling_loop::SamplingLoop;
use upsplus_logger::sink::{CsvSink, Session};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file (built-in defaults if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record file to summarise instead of logging
    #[arg(requires = "label")]
    record_file: Option<PathBuf>,

    /// Title for the summary, e.g. "Pi 4 idle, 2x 18650"
    label: Option<String>,
}

/// Main entry point for the UPSplus logger
///
/// # Control Flow
///
/// 1. **Report mode** (`RECORD_FILE LABEL`)
///    - Read the CSV file and print a discharge summary
///    - The I2C bus is never opened
///
/// 2. **Logging mode** (no positional arguments)
///    - Load configuration and build the register map (fatal if invalid)
///    - Open the I2C bus and create a new timestamped record file
///    - Sample every interval until Ctrl+C / SIGTERM
///
/// # Errors
///
/// Returns error (non-zero exit) if:
/// - Configuration or register map is invalid
/// - The I2C bus cannot be opened
/// - The record file cannot be created or written
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    let cli = Cli::parse();

    if let (Some(record_file), Some(label)) = (&cli.record_file, &cli.label) {
        let report = DischargeReport::from_path(record_file, label)
            .with_context(|| format!("cannot summarise {}", record_file.display()))?;
        print!("{}", report);
        return Ok(());
    }

    info!("UPSplus Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let map = RegisterMap::from_config(&config.bus, &config.registers)?;

    let bus = open_bus(&config)?;
    let session = Session::new(
        &config.output.directory,
        &config.output.file_prefix,
        Local::now(),
    );
    let sink = CsvSink::create(&session)?;
    info!(
        "Session started {}",
        session.started_at().format("%Y-%m-%d %H:%M:%S %Z")
    );

    info!("Note: remaining % is not accurate while charging");
    info!("Press Ctrl+C to exit");

    let mut sampling_loop = SamplingLoop::new(
        Sampler::new(bus, map),
        sink,
        Duration::from_millis(config.sampling.interval_ms),
    );
    sampling_loop
        .run(shutdown_signal())
        .await
        .with_context(|| format!("logging to {} failed", session.output_path().display()))?;

    Ok(())
}

#[cfg(feature = "rpi")]
fn open_bus(config: &Config) -> Result<Box<dyn I2cBus>> {
    let bus = upsplus_logger::bus::RppalBus::open(config.bus.i2c_bus, config.bus.read_timeout_ms)?;
    Ok(Box::new(bus))
}

#[cfg(not(feature = "rpi"))]
fn open_bus(_config: &Config) -> Result<Box<dyn I2cBus>> {
    anyhow::bail!("built without I2C support, rebuild with the `rpi` feature")
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
