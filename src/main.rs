//! Presscope acquisition console.
//!
//! Headless front-end for the acquisition pipeline: connects to a sensor,
//! logs trigger measurements and spectrum peaks, and shuts the pipeline
//! down cleanly on Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Stock sensor on the local network
//! presscope --address 192.168.4.1
//!
//! # Against the bundled simulator
//! simulate-sensor --port 3333 &
//! presscope --address 127.0.0.1 --trigger-level 0.0
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use presscope::acquisition::AcquisitionError;
use presscope::pipeline::{DisplaySink, Pipeline};
use presscope::processing::{Spectrum, TriggeredWave, WaveMeasurement};
use presscope::AcquisitionConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "presscope")]
#[command(about = "Pressure waveform acquisition and spectral analysis")]
#[command(version)]
struct CliArgs {
    /// Sensor address (IP or hostname)
    #[arg(short, long)]
    address: Option<String>,

    /// Sensor TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file (default: ./presscope.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the trigger level
    #[arg(long, value_name = "LEVEL")]
    trigger_level: Option<f64>,

    /// Override the trigger hysteresis
    #[arg(long, value_name = "BAND")]
    hysteresis: Option<f64>,

    /// Periods extracted on each side of the trigger point
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=5))]
    n_waves: Option<u8>,

    /// Disable the trigger (log the raw buffer tail instead)
    #[arg(long)]
    no_trigger: bool,

    /// Emit spectra and measurements as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

// ============================================================================
// Console Sink
// ============================================================================

/// Display collaborator that renders to the log instead of a plot.
struct ConsoleSink {
    json: bool,
}

impl DisplaySink for ConsoleSink {
    fn on_waveform(&self, wave: &TriggeredWave, measurement: Option<WaveMeasurement>) {
        if let Some(m) = measurement {
            if self.json {
                if let Ok(line) = serde_json::to_string(&m) {
                    println!("{line}");
                }
                return;
            }
            info!(
                window = wave.samples.len(),
                crossings = wave.crossings.len(),
                frequency_hz = m.frequency_hz,
                peak_to_peak = m.peak_to_peak,
                "Triggered waveform"
            );
        }
    }

    fn on_raw_tail(&self, samples: &[f64]) {
        info!(samples = samples.len(), "Untriggered display update");
    }

    fn on_spectrum(&self, spectrum: &Spectrum) {
        if self.json {
            if let Ok(line) = serde_json::to_string(spectrum) {
                println!("{line}");
            }
            return;
        }
        if let Some((frequency_hz, amplitude)) = spectrum.peak() {
            info!(
                bins = spectrum.frequencies.len(),
                peak_hz = frequency_hz,
                peak_amplitude = amplitude,
                "Spectrum updated"
            );
        }
    }

    fn on_disconnect(&self, error: &AcquisitionError) {
        warn!(error = %error, "Sensor disconnected — reconnect from the console when ready");
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();
    let mut config = AcquisitionConfig::load(args.config.as_deref())?;

    if let Some(address) = args.address {
        config.stream.address = address;
    }
    if let Some(port) = args.port {
        config.stream.port = port;
    }
    if let Some(level) = args.trigger_level {
        config.trigger.level = level;
    }
    if let Some(hysteresis) = args.hysteresis {
        config.trigger.hysteresis = hysteresis;
    }
    if let Some(n_waves) = args.n_waves {
        config.trigger.n_waves = usize::from(n_waves);
    }
    if args.no_trigger {
        config.trigger.enabled = false;
    }

    if config.stream.address.is_empty() {
        anyhow::bail!("no sensor address — pass --address or set stream.address in the config");
    }
    config.validate()?;

    let pipeline = Pipeline::start(config, Arc::new(ConsoleSink { json: args.json }), None)
        .await
        .context("failed to start acquisition pipeline")?;

    info!("Acquiring — press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    pipeline.shutdown().await;
    Ok(())
}
