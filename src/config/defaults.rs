//! System-wide default constants.
//!
//! Centralises the acquisition magic numbers in one place.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Transport
// ============================================================================

/// Default TCP port the sensor firmware listens on.
pub const SENSOR_PORT: u16 = 3333;

/// Bytes consumed per reassembled logical frame.
pub const MAX_PACKET_LEN: usize = 2048;

/// Size of a single socket read. Deliberately independent of the frame
/// length; reassembly must tolerate any chunking.
pub const RECV_CHUNK_LEN: usize = 512;

/// Frame header byte declared by the sensor firmware.
///
/// Never validated against incoming bytes — framing is purely count-based
/// (`MAX_PACKET_LEN`). Whether that is sufficient is an integrator decision;
/// see DESIGN.md.
pub const PACKET_HEADER: u8 = 0xFD;

/// Text message sent once after connect to request that streaming begin.
pub const START_MESSAGE: &str = "connection_request";

/// TCP connect timeout (seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Attempts to observe the first decoded frame before `connect` gives up.
pub const FIRST_DATA_RETRIES: u32 = 10;

/// Sleep between first-data polls (milliseconds).
pub const FIRST_DATA_POLL_MS: u64 = 100;

// ============================================================================
// Sampling
// ============================================================================

/// ADC sampling frequency of the sensor (Hz).
pub const SAMPLE_RATE_HZ: f64 = 100_000.0;

/// Linear scale from a raw 16-bit ADC code to pressure in N/m².
///
/// 12-bit ADC span mapped through the int16 wire format, 1.25 V reference,
/// divided down to the transducer's pressure range.
pub const CONVERSION_CONSTANT: f64 = 4096.0 / 32767.0 * 1.25 / 1000.0;

// ============================================================================
// Buffering & Display
// ============================================================================

/// Sliding window capacity (samples). 50 000 = 0.5 s at 100 kHz.
pub const BUFFER_LEN: usize = 50_000;

/// Value the buffer is pre-filled with before the first append.
pub const BUFFER_FILL_VALUE: f64 = 1.0;

/// Samples shown when the trigger is disabled (raw tail of the buffer).
pub const MAX_DISPLAY_LEN: usize = 10_000;

// ============================================================================
// Trigger
// ============================================================================

/// Default trigger level (same unit as scaled samples).
pub const TRIGGER_LEVEL: f64 = 1.6;

/// Default trigger hysteresis dead-band.
pub const TRIGGER_HYSTERESIS: f64 = 0.1;

/// Default number of full periods extracted on each side of the trigger.
pub const TRIGGER_N_WAVES: usize = 2;

/// Minimum level crossings before a snapshot is considered triggerable.
pub const MIN_CROSSINGS: usize = 5;

// ============================================================================
// Consumer Ticks
// ============================================================================

/// Trigger / display tick interval (milliseconds).
pub const DISPLAY_TICK_MS: u64 = 20;

/// Spectral analysis tick interval (milliseconds).
pub const SPECTRUM_TICK_MS: u64 = 1_000;

/// How often the pipeline watchdog checks the ingest loop (milliseconds).
pub const WATCHDOG_TICK_MS: u64 = 500;
