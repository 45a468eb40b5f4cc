//! FFT spectrum computation using rustfft.
//!
//! Two entry points over the same snapshot: the direct transform used by
//! the live spectrum tick, and a phase-corrected windowed variant that
//! trades half the frequency resolution for phase estimates referenced to
//! the window centre.

use super::ProcessingError;
use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Smallest snapshot worth transforming.
const MIN_SPECTRUM_LEN: usize = 8;

// ============================================================================
// Spectrum Result
// ============================================================================

/// Frequency-domain decomposition of one buffer snapshot.
///
/// Three equal-length sequences over bins `k = 1 .. N/2 - 1` (DC dropped):
/// frequency in Hz ascending, amplitude normalised so a pure sinusoid of
/// amplitude A reports ≈ A, and phase in radians normalised by π.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies (Hz), strictly ascending.
    pub frequencies: Vec<f64>,
    /// Normalised linear amplitude per bin, non-negative.
    pub amplitudes: Vec<f64>,
    /// Phase per bin, radians / π, in (-1, 1].
    pub phases: Vec<f64>,
    /// Sample rate the bins were derived from.
    pub sample_rate: f64,
    /// When the snapshot was analysed.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Spectrum {
    /// Phase per bin in degrees, for display collaborators.
    pub fn phases_degrees(&self) -> Vec<f64> {
        self.phases.iter().map(|p| p * 180.0).collect()
    }

    /// Dominant bin: `(frequency_hz, amplitude)` at the amplitude maximum.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.amplitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &amp)| (self.frequencies[i], amp))
    }
}

// ============================================================================
// Direct Spectrum
// ============================================================================

/// Compute the amplitude/phase spectrum of a snapshot.
///
/// Bins are `k * sample_rate / N` for `k = 1 .. N/2 - 1`; amplitude is
/// `(2/N) * |Y[k]|`; phase is `arg(Y[k]) / π`.
pub fn compute_spectrum(samples: &[f64], sample_rate: f64) -> Result<Spectrum, ProcessingError> {
    if sample_rate <= 0.0 {
        return Err(ProcessingError::InvalidSampleRate(sample_rate));
    }
    if samples.len() < MIN_SPECTRUM_LEN {
        return Err(ProcessingError::InsufficientData {
            needed: MIN_SPECTRUM_LEN,
            available: samples.len(),
        });
    }

    let n = samples.len();
    let transform = forward_transform(samples);
    Ok(bins_to_spectrum(&transform, n, sample_rate, 2.0 / n as f64))
}

/// Phase-corrected windowed spectrum.
///
/// Applies a Hann window, folds the windowed signal to half length (which
/// aliases the transform onto its even bins), and circularly shifts the
/// folded buffer by a quarter window so phases are referenced to the window
/// centre rather than its leading edge. Halves the frequency resolution;
/// the Hann coherent gain cancels against the fold, so the amplitude
/// normalisation matches the direct variant.
pub fn compute_spectrum_phase_corrected(
    samples: &[f64],
    sample_rate: f64,
) -> Result<Spectrum, ProcessingError> {
    if sample_rate <= 0.0 {
        return Err(ProcessingError::InvalidSampleRate(sample_rate));
    }
    if samples.len() < 2 * MIN_SPECTRUM_LEN {
        return Err(ProcessingError::InsufficientData {
            needed: 2 * MIN_SPECTRUM_LEN,
            available: samples.len(),
        });
    }

    // Even length keeps the fold exact; drop at most one trailing sample.
    let n = samples.len() & !1;
    let half = n / 2;

    // Periodic Hann, then fold: folded[m] = w[m]x[m] + w[m+half]x[m+half].
    // FFT(folded)[k] equals FFT(windowed)[2k].
    let mut folded = vec![0.0f64; half];
    for m in 0..half {
        let w0 = hann(m, n);
        let w1 = hann(m + half, n);
        folded[m] = samples[m] * w0 + samples[m + half] * w1;
    }

    // Quarter-window circular shift moves the phase reference to the centre.
    folded.rotate_left(half / 2);

    let transform = forward_transform(&folded);
    Ok(bins_to_spectrum(
        &transform,
        half,
        sample_rate,
        2.0 / half as f64,
    ))
}

// ============================================================================
// Internals
// ============================================================================

/// Periodic Hann window coefficient.
fn hann(i: usize, n: usize) -> f64 {
    0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos())
}

/// Forward complex DFT of a real signal.
pub(crate) fn forward_transform(samples: &[f64]) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(samples.len());
    let mut spectrum: Vec<Complex<f64>> =
        samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut spectrum);
    spectrum
}

/// Derive frequency / amplitude / phase sequences over bins 1 .. n/2 - 1.
fn bins_to_spectrum(
    transform: &[Complex<f64>],
    n: usize,
    sample_rate: f64,
    amplitude_scale: f64,
) -> Spectrum {
    let bins = 1..n / 2;
    let frequencies: Vec<f64> = bins
        .clone()
        .map(|k| k as f64 * sample_rate / n as f64)
        .collect();
    let amplitudes: Vec<f64> = bins
        .clone()
        .map(|k| transform[k].norm() * amplitude_scale)
        .collect();
    let phases: Vec<f64> = bins.map(|k| transform[k].arg() / PI).collect();

    Spectrum {
        frequencies,
        amplitudes,
        phases,
        sample_rate,
        timestamp: chrono::Utc::now(),
    }
}

// ============================================================================
// Tests
// ============================================================================
