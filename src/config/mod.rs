//! Acquisition Configuration
//!
//! Provides the configuration surface consumed by the acquisition pipeline,
//! loaded from TOML files with built-in defaults matching the sensor
//! firmware's shipped settings.
//!
//! ## Loading Order
//!
//! 1. Explicit path passed to [`AcquisitionConfig::load`]
//! 2. `presscope.toml` in the current working directory
//! 3. Built-in defaults

pub mod defaults;

use crate::acquisition::SampleFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one sensor connection.
///
/// Every field has a default matching the firmware's shipped settings, so an
/// empty TOML file (or none at all) yields a working configuration for the
/// stock sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Transport / framing parameters
    #[serde(default)]
    pub stream: StreamConfig,

    /// Sampling and unit conversion
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Trigger defaults for the display tick
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Consumer tick intervals
    #[serde(default)]
    pub ticks: TickConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            sampling: SamplingConfig::default(),
            trigger: TriggerConfig::default(),
            ticks: TickConfig::default(),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// TCP transport and frame reassembly parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sensor address (IP or hostname). Supplied by the device-configuration
    /// collaborator; no default makes sense, so empty means "must be set".
    #[serde(default)]
    pub address: String,

    /// Destination TCP port
    #[serde(default = "d_port")]
    pub port: u16,

    /// Bytes per reassembled logical frame
    #[serde(default = "d_max_packet_len")]
    pub max_packet_len: usize,

    /// Wire element format (width + signedness)
    #[serde(default)]
    pub sample_format: SampleFormat,

    /// Text sent once after connect to start streaming; `None` sends nothing
    #[serde(default = "d_start_message")]
    pub start_message: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: d_port(),
            max_packet_len: d_max_packet_len(),
            sample_format: SampleFormat::default(),
            start_message: d_start_message(),
        }
    }
}

/// Sampling rate, unit conversion and buffer sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sensor ADC sampling rate (Hz)
    #[serde(default = "d_sample_rate")]
    pub sample_rate_hz: f64,

    /// Linear scale applied to each decoded code
    #[serde(default = "d_conversion")]
    pub conversion_constant: f64,

    /// Sliding window capacity (samples)
    #[serde(default = "d_buffer_len")]
    pub buffer_len: usize,

    /// Raw tail length shown when the trigger is disabled
    #[serde(default = "d_max_display_len")]
    pub max_display_len: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: d_sample_rate(),
            conversion_constant: d_conversion(),
            buffer_len: d_buffer_len(),
            max_display_len: d_max_display_len(),
        }
    }
}

/// Level-crossing trigger defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Trigger enabled — when false the display tick forwards the raw tail
    #[serde(default = "d_true")]
    pub enabled: bool,

    /// Trigger level in scaled physical units
    #[serde(default = "d_trigger_level")]
    pub level: f64,

    /// Hysteresis dead-band around the level
    #[serde(default = "d_hysteresis")]
    pub hysteresis: f64,

    /// Full periods extracted on each side of the trigger point (2–5)
    #[serde(default = "d_n_waves")]
    pub n_waves: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: d_trigger_level(),
            hysteresis: d_hysteresis(),
            n_waves: d_n_waves(),
        }
    }
}

/// Consumer tick intervals (milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "d_display_tick")]
    pub display_ms: u64,

    #[serde(default = "d_spectrum_tick")]
    pub spectrum_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            display_ms: d_display_tick(),
            spectrum_ms: d_spectrum_tick(),
        }
    }
}

// serde default helpers
fn d_port() -> u16 {
    defaults::SENSOR_PORT
}
fn d_max_packet_len() -> usize {
    defaults::MAX_PACKET_LEN
}
fn d_start_message() -> Option<String> {
    Some(defaults::START_MESSAGE.to_string())
}
fn d_sample_rate() -> f64 {
    defaults::SAMPLE_RATE_HZ
}
fn d_conversion() -> f64 {
    defaults::CONVERSION_CONSTANT
}
fn d_buffer_len() -> usize {
    defaults::BUFFER_LEN
}
fn d_max_display_len() -> usize {
    defaults::MAX_DISPLAY_LEN
}
fn d_trigger_level() -> f64 {
    defaults::TRIGGER_LEVEL
}
fn d_hysteresis() -> f64 {
    defaults::TRIGGER_HYSTERESIS
}
fn d_n_waves() -> usize {
    defaults::TRIGGER_N_WAVES
}
fn d_display_tick() -> u64 {
    defaults::DISPLAY_TICK_MS
}
fn d_spectrum_tick() -> u64 {
    defaults::SPECTRUM_TICK_MS
}
fn d_true() -> bool {
    true
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl AcquisitionConfig {
    /// Load configuration from an optional explicit path, falling back to
    /// `./presscope.toml`, falling back to built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let cwd = Path::new("presscope.toml");
                cwd.exists().then(|| cwd.to_path_buf())
            }
        };

        let config = match candidate {
            Some(p) => {
                let text = std::fs::read_to_string(&p)?;
                let config: Self = toml::from_str(&text)?;
                info!(path = %p.display(), "Loaded acquisition config");
                config
            }
            None => {
                info!("No config file found — using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Returns the first problem found.
    pub fn validate(&self) -> anyhow::Result<()> {
        let element = self.stream.sample_format.width();
        if self.stream.max_packet_len == 0 {
            anyhow::bail!("stream.max_packet_len must be non-zero");
        }
        if self.stream.max_packet_len % element != 0 {
            anyhow::bail!(
                "stream.max_packet_len ({}) must be a multiple of the element width ({})",
                self.stream.max_packet_len,
                element
            );
        }
        if self.sampling.sample_rate_hz <= 0.0 {
            anyhow::bail!(
                "sampling.sample_rate_hz must be positive, got {}",
                self.sampling.sample_rate_hz
            );
        }
        if self.sampling.buffer_len == 0 {
            anyhow::bail!("sampling.buffer_len must be non-zero");
        }
        if self.trigger.n_waves == 0 {
            anyhow::bail!("trigger.n_waves must be at least 1");
        }
        if self.trigger.hysteresis < 0.0 {
            anyhow::bail!("trigger.hysteresis must be non-negative");
        }
        if self.sampling.max_display_len > self.sampling.buffer_len {
            warn!(
                max_display_len = self.sampling.max_display_len,
                buffer_len = self.sampling.buffer_len,
                "max_display_len exceeds buffer capacity — clamping at runtime"
            );
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
