//! Time-domain descriptors: RMS loudness, peak level, dynamic range, zero-crossing rate.

use super::spectrum::{frame_count, frames, pad_centered, PadMode, FFT_SIZE, HOP_SIZE};

/// Added before taking a logarithm so silence maps to a finite level.
pub const DB_EPSILON: f64 = 1e-10;
/// Fixed calibration between mean RMS level and the LUFS-like figure.
pub const LUFS_OFFSET_DB: f64 = 23.0;

/// Magnitudes at or below this are treated as zero when counting sign changes.
const ZERO_CROSSING_THRESHOLD: f32 = 1e-10;

/// Root-mean-square of each centred, zero-padded frame.
pub fn frame_rms(samples: &[f32]) -> Vec<f32> {
    let padded = pad_centered(samples, FFT_SIZE, PadMode::Zero);
    let count = frame_count(samples.len(), HOP_SIZE);
    frames(&padded, FFT_SIZE, HOP_SIZE, count)
        .map(|frame| {
            let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (energy / frame.len() as f64).sqrt() as f32
        })
        .collect()
}

/// Mean of the framed RMS curve.
pub fn mean_rms(samples: &[f32]) -> f64 {
    mean(&frame_rms(samples))
}

/// `20 * log10(amplitude + 1e-10)`.
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    20.0 * (amplitude + DB_EPSILON).log10()
}

pub fn lufs_approx(rms_db: f64) -> f64 {
    rms_db - LUFS_OFFSET_DB
}

pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Crest factor in decibels.
pub fn dynamic_range_db(peak_db: f64, rms_db: f64) -> f64 {
    peak_db - rms_db
}

/// Mean fraction of sign changes per frame. Zero counts as positive.
pub fn zero_crossing_rate(samples: &[f32]) -> f64 {
    let padded = pad_centered(samples, FFT_SIZE, PadMode::Edge);
    let count = frame_count(samples.len(), HOP_SIZE);
    let rates: Vec<f32> = frames(&padded, FFT_SIZE, HOP_SIZE, count)
        .map(|frame| {
            let negative = |s: f32| s.abs() > ZERO_CROSSING_THRESHOLD && s < 0.0;
            let crossings = frame
                .windows(2)
                .filter(|pair| negative(pair[0]) != negative(pair[1]))
                .count();
            crossings as f32 / frame.len() as f32
        })
        .collect();
    mean(&rates)
}

fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}
