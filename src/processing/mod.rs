//! Signal processing — level-crossing trigger and FFT spectrum.
//!
//! Both operate on buffer snapshots only and share no mutable state; they
//! are pure functions invoked from the consumer ticks.

mod spectrum;
mod trigger;

pub use spectrum::{compute_spectrum, compute_spectrum_phase_corrected, Spectrum};
pub use trigger::{find_wave, TriggeredWave, WaveMeasurement};

use thiserror::Error;

/// Errors in signal processing.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),
}
