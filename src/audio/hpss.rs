//! Median-filter harmonic/percussive source separation.
//!
//! Sustained partials are smooth along time, transients are smooth along
//! frequency. Filtering the magnitude spectrogram in each direction gives two
//! estimates that are turned into soft masks, applied to the complex STFT and
//! resynthesised.

use rustfft::num_complex::Complex;

use super::spectrum::{Spectrogram, Stft};

pub const KERNEL_SIZE: usize = 31;
const MASK_POWER: i32 = 2;
const RATIO_EPSILON: f64 = 1e-10;

/// Time-domain harmonic and percussive components.
#[derive(Clone, Debug)]
pub struct Separation {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Share of total absolute amplitude carried by each component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentRatios {
    pub harmonic: f64,
    pub percussive: f64,
}

pub fn separate(stft: &Stft, length: usize) -> Separation {
    let magnitude = stft.magnitude();
    let harmonic_est = median_along_time(&magnitude, KERNEL_SIZE);
    let percussive_est = median_along_frequency(&magnitude, KERNEL_SIZE);

    let mut harmonic_frames = Vec::with_capacity(stft.frames().len());
    let mut percussive_frames = Vec::with_capacity(stft.frames().len());

    for (t, frame) in stft.frames().iter().enumerate() {
        let mut h = Vec::with_capacity(frame.len());
        let mut p = Vec::with_capacity(frame.len());
        for (k, &bin) in frame.iter().enumerate() {
            let (mask_h, mask_p) = soft_masks(harmonic_est[t][k], percussive_est[t][k]);
            h.push(bin * mask_h);
            p.push(bin * mask_p);
        }
        harmonic_frames.push(h);
        percussive_frames.push(p);
    }

    let rebuild = |frames: Vec<Vec<Complex<f32>>>| {
        Stft::from_frames(frames, stft.sample_rate(), stft.n_fft(), stft.hop()).inverse(length)
    };

    Separation {
        harmonic: rebuild(harmonic_frames),
        percussive: rebuild(percussive_frames),
    }
}

impl Separation {
    /// Each component's share of `Σ|h| + Σ|p|`, so the two always sum to 1.
    ///
    /// The denominator is not the mixture's `Σ|y|`: where the components
    /// partially cancel, that would let the sum drift away from 1.
    pub fn ratios(&self) -> ComponentRatios {
        let h: f64 = self.harmonic.iter().map(|&s| s.abs() as f64).sum();
        let p: f64 = self.percussive.iter().map(|&s| s.abs() as f64).sum();
        let total = h + p + RATIO_EPSILON;
        ComponentRatios {
            harmonic: h / total,
            percussive: p / total,
        }
    }
}

/// Wiener-style masks; both are zero where neither estimate has energy.
fn soft_masks(harmonic: f32, percussive: f32) -> (f32, f32) {
    let z = harmonic.max(percussive);
    if z < f32::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    let h = (harmonic / z).powi(MASK_POWER);
    let p = (percussive / z).powi(MASK_POWER);
    let total = h + p;
    (h / total, p / total)
}

/// Median over a sliding window with symmetric (half-sample) reflection at the edges.
pub fn median_filter(input: &[f32], size: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (size / 2) as isize;
    let mut window = Vec::with_capacity(size);
    (0..n as isize)
        .map(|i| {
            window.clear();
            window.extend((i - half..=i + half).map(|j| input[reflect(j, n as isize)]));
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            *median
        })
        .collect()
}

fn reflect(mut i: isize, n: isize) -> usize {
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

fn median_along_time(spec: &Spectrogram, size: usize) -> Vec<Vec<f32>> {
    let frames = spec.frames();
    let n_frames = frames.len();
    let n_bins = frames.first().map_or(0, |f| f.len());
    let mut out = vec![vec![0.0f32; n_bins]; n_frames];
    let mut column = Vec::with_capacity(n_frames);
    for k in 0..n_bins {
        column.clear();
        column.extend(frames.iter().map(|f| f[k]));
        for (t, v) in median_filter(&column, size).into_iter().enumerate() {
            out[t][k] = v;
        }
    }
    out
}

fn median_along_frequency(spec: &Spectrogram, size: usize) -> Vec<Vec<f32>> {
    spec.frames()
        .iter()
        .map(|frame| median_filter(frame, size))
        .collect()
}
