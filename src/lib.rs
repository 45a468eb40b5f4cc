//! Presscope: pressure waveform acquisition and analysis.
//!
//! Ingests a continuous binary telemetry stream from a remote pressure
//! sensor over TCP, reassembles it into fixed-width frames, keeps a sliding
//! window of scaled samples, and derives trigger-aligned waveforms and FFT
//! spectra from buffer snapshots.
//!
//! ## Architecture
//!
//! - **acquisition**: TCP transport, frame reassembly, wire decode
//! - **buffer**: the shared sliding sample window and its lock
//! - **processing**: level-crossing trigger and spectrum computation
//! - **pipeline**: one connection's producer task + consumer ticks
//! - **config**: TOML-backed configuration surface

pub mod acquisition;
pub mod buffer;
pub mod config;
pub mod pipeline;
pub mod processing;

// Re-export the configuration root
pub use config::AcquisitionConfig;

// Re-export commonly used types
pub use acquisition::{AcquisitionError, SampleFormat, StreamIngestor};
pub use buffer::SampleBuffer;
pub use pipeline::{DisplaySink, Pipeline, RecordingSink};
pub use processing::{
    compute_spectrum, compute_spectrum_phase_corrected, find_wave, ProcessingError, Spectrum,
    TriggeredWave, WaveMeasurement,
};
