//! Slaney-style mel filterbank and decibel conversion.

use super::spectrum::Spectrogram;

pub const N_MELS: usize = 128;

/// Smallest power considered when converting to decibels.
pub const AMIN: f32 = 1e-10;
/// Dynamic range kept below the loudest value.
pub const TOP_DB: f32 = 80.0;

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular, area-normalised filters spanning 0 Hz to Nyquist.
#[derive(Clone, Debug)]
pub struct MelFilterbank {
    weights: Vec<Vec<f32>>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f32> = (0..n_bins)
            .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let min_mel = hz_to_mel(0.0);
        let max_mel = hz_to_mel(sample_rate as f32 / 2.0);
        let mel_points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (lo, center, hi) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let enorm = 2.0 / (hi - lo);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - lo) / (center - lo);
                        let upper = (hi - f) / (hi - center);
                        lower.min(upper).max(0.0) * enorm
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Projects one power-spectrum frame onto the mel bands.
    pub fn apply(&self, power_frame: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|filter| filter.iter().zip(power_frame).map(|(w, p)| w * p).sum())
            .collect()
    }

    /// Mel power spectrogram, `[frame][band]`.
    pub fn project(&self, power: &Spectrogram) -> Vec<Vec<f32>> {
        power.frames().iter().map(|frame| self.apply(frame)).collect()
    }
}

/// `10 * log10(max(x, AMIN))`, clipped to `TOP_DB` below the global maximum.
pub fn power_to_db(values: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut db: Vec<Vec<f32>> = values
        .iter()
        .map(|row| row.iter().map(|&x| 10.0 * x.max(AMIN).log10()).collect())
        .collect();

    let max = db
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    if max.is_finite() {
        let floor = max - TOP_DB;
        for value in db.iter_mut().flat_map(|row| row.iter_mut()) {
            *value = value.max(floor);
        }
    }
    db
}
