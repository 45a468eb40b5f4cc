//! Hysteretic level-crossing trigger.
//!
//! Finds stable edges of a periodic signal by requiring the samples around
//! a crossing to clear the trigger level by a hysteresis dead-band, then
//! extracts a window spanning a configured number of periods around a
//! crossing chosen near the newest data. Too little history, too few
//! crossings, or any window that would index outside the snapshot all yield
//! `None` — untriggerable is a steady-state condition, not an error.

use crate::config::defaults::MIN_CROSSINGS;
use serde::{Deserialize, Serialize};

// ============================================================================
// Results
// ============================================================================

/// A trigger-aligned waveform extracted from one buffer snapshot.
///
/// All indices are relative to `samples`; `center_offset` marks the chosen
/// trigger point (the local maximum the window is centred on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredWave {
    /// The extracted window, `2 * n_waves * wave_length + 1` samples.
    pub samples: Vec<f64>,
    /// Offset of the centre crossing's local maximum within `samples`.
    pub center_offset: usize,
    /// Level-crossing indices within `samples`, ascending. Crossings that
    /// fall outside the extracted window are dropped.
    pub crossings: Vec<usize>,
    /// Offset of the local minimum adjacent to the centre.
    pub low_offset: usize,
}

/// Scalar measurements derived from a triggered window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaveMeasurement {
    /// Dominant frequency from the first crossing pair (Hz).
    pub frequency_hz: f64,
    /// Peak-to-peak amplitude over the window.
    pub peak_to_peak: f64,
}

impl TriggeredWave {
    /// Measure dominant frequency and peak-to-peak amplitude.
    ///
    /// Consecutive crossings are half a period apart (one rising and one
    /// falling edge per period), so the period is twice the first crossing
    /// gap. Returns `None` without at least two crossings.
    pub fn measure(&self, sample_rate: f64) -> Option<WaveMeasurement> {
        if self.crossings.len() < 2 || sample_rate <= 0.0 {
            return None;
        }
        let gap = self.crossings[1].checked_sub(self.crossings[0])?;
        if gap == 0 {
            return None;
        }
        let frequency_hz = sample_rate / (2 * gap) as f64;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &s in &self.samples {
            min = min.min(s);
            max = max.max(s);
        }

        Some(WaveMeasurement {
            frequency_hz,
            peak_to_peak: max - min,
        })
    }
}

// ============================================================================
// Trigger Detection
// ============================================================================

/// Find a trigger-aligned waveform in a buffer snapshot.
///
/// * `n_waves` — full periods extracted on each side of the trigger point
/// * `trigger_level` — threshold in scaled physical units
/// * `hysteresis` — dead-band; an edge only counts when the signal passes
///   from one side of `level ± hysteresis` to the other between adjacent
///   samples, which suppresses false triggers from noise near the threshold
///
/// Returns `None` whenever the snapshot cannot produce a complete window:
/// fewer than [`MIN_CROSSINGS`] crossings, a flat (zero-length) wave
/// estimate, or a window that would extend beyond the snapshot. During
/// buffer warm-up these cases are routine and simply mean "no update this
/// tick".
pub fn find_wave(
    signal: &[f64],
    n_waves: usize,
    trigger_level: f64,
    hysteresis: f64,
) -> Option<TriggeredWave> {
    if n_waves == 0 || signal.len() < 2 {
        return None;
    }

    let crossings = find_crossings(signal, trigger_level, hysteresis);
    if crossings.len() < MIN_CROSSINGS {
        return None;
    }

    // Centre crossing sits a fixed distance back from the newest data,
    // leaving room for n_waves periods on each side.
    let center_cross = crossings
        .len()
        .checked_sub(n_waves * 2 + 2)
        .filter(|&c| c >= 1)?;

    let wave_lo = crossings[center_cross - 1];
    let wave_hi = crossings[center_cross + 1];
    if wave_lo >= wave_hi {
        return None;
    }

    // Local extrema of the one-period sub-signal around the centre crossing;
    // their distance estimates half a period.
    let wave = &signal[wave_lo..wave_hi];
    let center_index = wave_lo + argmax(wave)?;
    let low_index = wave_lo + argmin(wave)?;
    let wave_length = center_index.abs_diff(low_index);
    if wave_length == 0 {
        return None;
    }

    let half_window = n_waves * wave_length;
    let start = center_index.checked_sub(half_window)?;
    let end = center_index + half_window;
    if end >= signal.len() {
        return None;
    }

    let samples = signal[start..=end].to_vec();
    let window_crossings: Vec<usize> = crossings[center_cross - 1..=center_cross + 1]
        .iter()
        .filter(|&&c| c >= start && c <= end)
        .map(|&c| c - start)
        .collect();

    Some(TriggeredWave {
        samples,
        center_offset: half_window,
        crossings: window_crossings,
        low_offset: low_index - start,
    })
}

/// Indices `i` where the signal crosses `level + hysteresis` rising or
/// `level - hysteresis` falling between samples `i` and `i + 1`.
/// Rising and falling crossings interleave, so the union is ascending.
fn find_crossings(signal: &[f64], level: f64, hysteresis: f64) -> Vec<usize> {
    let upper = level + hysteresis;
    let lower = level - hysteresis;
    signal
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| {
            (pair[0] < upper && pair[1] > upper) || (pair[0] > lower && pair[1] < lower)
        })
        .map(|(i, _)| i)
        .collect()
}

fn argmax(samples: &[f64]) -> Option<usize> {
    samples
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn argmin(samples: &[f64]) -> Option<usize> {
    samples
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

// ============================================================================
// Tests
// ============================================================================
