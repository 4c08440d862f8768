//! Coarse key estimate from mean STFT chroma energy.

use serde::{Deserialize, Serialize};

use super::spectrum::Spectrogram;

const N_CHROMA: usize = 12;
/// Centre octave of the Gaussian octave weighting (C5).
const CENTER_OCTAVE: f32 = 5.0;
const OCTAVE_WIDTH: f32 = 2.0;
/// A0 with A4 tuned to 440 Hz.
const A0_HZ: f32 = 440.0 / 16.0;

/// Peaks are only picked between these frequencies when estimating tuning.
const TUNING_FMIN: f32 = 150.0;
const TUNING_FMAX: f32 = 4000.0;
/// Peaks below this fraction of the frame maximum are ignored.
const PEAK_THRESHOLD: f32 = 0.1;
/// Histogram resolution of the tuning estimate, in fractions of a semitone.
const TUNING_RESOLUTION: f32 = 0.01;

/// One of the twelve pitch classes, serialised with sharps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn from_index(index: usize) -> PitchClass {
        Self::ALL[index % N_CHROMA]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl std::fmt::Display for PitchClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps FFT bins to pitch classes with Gaussian bumps, rows starting at C.
#[derive(Clone, Debug)]
pub struct ChromaFilterbank {
    weights: Vec<Vec<f32>>,
}

impl ChromaFilterbank {
    /// `tuning` is the deviation from A440 in fractions of a semitone.
    pub fn new(sample_rate: u32, n_fft: usize, tuning: f32) -> Self {
        let n_chroma = N_CHROMA as f32;
        let a0 = A0_HZ * 2f32.powf(tuning / n_chroma);

        // Fractional chroma bin of every FFT bin over the full (two-sided) range.
        let mut frq_bins = Vec::with_capacity(n_fft);
        for k in 1..n_fft {
            let freq = k as f32 * sample_rate as f32 / n_fft as f32;
            frq_bins.push(n_chroma * (freq / a0).log2());
        }
        // DC gets a value 1.5 octaves below the first bin.
        frq_bins.insert(0, frq_bins[0] - 1.5 * n_chroma);

        let mut bin_widths: Vec<f32> = frq_bins
            .windows(2)
            .map(|w| (w[1] - w[0]).max(1.0))
            .collect();
        bin_widths.push(1.0);

        let half_chroma = (n_chroma / 2.0).round();
        let mut weights = vec![vec![0.0f32; n_fft]; N_CHROMA];
        for (k, (&fb, &width)) in frq_bins.iter().zip(bin_widths.iter()).enumerate() {
            for (c, row) in weights.iter_mut().enumerate() {
                let d = (fb - c as f32 + half_chroma + 10.0 * n_chroma).rem_euclid(n_chroma)
                    - half_chroma;
                row[k] = (-0.5 * (2.0 * d / width).powi(2)).exp();
            }
        }

        // Unit L2 norm per FFT bin, then the octave emphasis.
        for k in 0..n_fft {
            let norm = weights.iter().map(|row| row[k] * row[k]).sum::<f32>().sqrt();
            let octave =
                (-0.5 * ((frq_bins[k] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
            for row in weights.iter_mut() {
                if norm > f32::MIN_POSITIVE {
                    row[k] /= norm;
                }
                row[k] *= octave;
            }
        }

        // Rows are indexed from A; rotate so row 0 is C.
        weights.rotate_left(3);
        for row in weights.iter_mut() {
            row.truncate(n_fft / 2 + 1);
        }

        Self { weights }
    }

    /// Chroma energy of one power-spectrum frame, scaled so its maximum is 1.
    pub fn apply(&self, power_frame: &[f32]) -> [f32; N_CHROMA] {
        let mut chroma = [0.0f32; N_CHROMA];
        for (slot, row) in chroma.iter_mut().zip(self.weights.iter()) {
            *slot = row.iter().zip(power_frame).map(|(w, p)| w * p).sum();
        }
        let max = chroma.iter().copied().fold(0.0f32, f32::max);
        if max > f32::MIN_POSITIVE {
            for v in chroma.iter_mut() {
                *v /= max;
            }
        }
        chroma
    }
}

/// Mean normalised chroma vector over all frames, with the filterbank shifted
/// to the estimated tuning.
pub fn mean_chroma(power: &Spectrogram) -> [f64; N_CHROMA] {
    let tuning = estimate_tuning(power);
    log::debug!("Estimated tuning: {:+.2} semitones", tuning);
    let bank = ChromaFilterbank::new(power.sample_rate(), power.n_fft(), tuning);
    let mut sum = [0.0f64; N_CHROMA];
    for frame in power.frames() {
        for (acc, v) in sum.iter_mut().zip(bank.apply(frame)) {
            *acc += v as f64;
        }
    }
    let n = power.num_frames().max(1) as f64;
    sum.map(|v| v / n)
}

/// Deviation of the spectrum's peaks from A440 equal temperament, in
/// fractions of a semitone within `[-0.5, 0.5)`.
///
/// Peaks are located per frame by parabolic interpolation; only those at
/// least as strong as the median peak vote in a histogram of residuals.
pub fn estimate_tuning(power: &Spectrogram) -> f32 {
    let (pitches, magnitudes) = spectral_peaks(power);
    if pitches.is_empty() {
        return 0.0;
    }

    let mut sorted = magnitudes.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let n_bins = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let mut counts = vec![0usize; n_bins];
    for (&pitch, &mag) in pitches.iter().zip(magnitudes.iter()) {
        if mag < median {
            continue;
        }
        let mut residual = (N_CHROMA as f32 * (pitch / A0_HZ).log2()).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let bin = (((residual + 0.5) / TUNING_RESOLUTION) as usize).min(n_bins - 1);
        counts[bin] += 1;
    }

    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    -0.5 + best as f32 * TUNING_RESOLUTION
}

/// Interpolated frequency and magnitude of every local spectral maximum in
/// the tuning range.
fn spectral_peaks(power: &Spectrogram) -> (Vec<f32>, Vec<f32>) {
    let freqs = power.frequencies();
    let resolution = power.sample_rate() as f32 / power.n_fft() as f32;
    let fmax = TUNING_FMAX.min(power.nyquist());

    let mut pitches = Vec::new();
    let mut magnitudes = Vec::new();
    for frame in power.frames() {
        let n = frame.len();
        if n < 3 {
            continue;
        }
        let reference = PEAK_THRESHOLD * frame.iter().copied().fold(0.0f32, f32::max);
        let gated = |k: usize| if frame[k] > reference { frame[k] } else { 0.0 };

        for k in 1..n - 1 {
            if freqs[k] < TUNING_FMIN || freqs[k] >= fmax {
                continue;
            }
            let (left, here, right) = (gated(k - 1), gated(k), gated(k + 1));
            if !(here > left && here >= right) {
                continue;
            }
            let avg = 0.5 * (frame[k + 1] - frame[k - 1]);
            let curvature = 2.0 * frame[k] - frame[k + 1] - frame[k - 1];
            let shift = if curvature.abs() < f32::MIN_POSITIVE {
                avg
            } else {
                avg / curvature
            };
            pitches.push((k as f32 + shift) * resolution);
            magnitudes.push(frame[k] + 0.5 * avg * shift);
        }
    }
    (pitches, magnitudes)
}

/// Pitch class with the largest mean chroma energy; ties go to the lowest class.
pub fn estimate_key(power: &Spectrogram) -> PitchClass {
    let chroma = mean_chroma(power);
    let mut best = 0;
    for (i, &v) in chroma.iter().enumerate() {
        if v > chroma[best] {
            best = i;
        }
    }
    log::debug!("Chroma means: {:?}, key {}", chroma, PitchClass::from_index(best));
    PitchClass::from_index(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::Stft;

    fn power_of_tone(freq: f32) -> Spectrogram {
        let samples: Vec<f32> = (0..22050)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 22050.0).sin())
            .collect();
        Stft::compute(&samples, 22050).magnitude().squared()
    }

    #[test]
    fn a440_is_a() {
        assert_eq!(estimate_key(&power_of_tone(440.0)), PitchClass::A);
    }

    #[test]
    fn middle_c_is_c() {
        assert_eq!(estimate_key(&power_of_tone(261.63)), PitchClass::C);
    }

    #[test]
    fn e_above_middle_c_is_e() {
        assert_eq!(estimate_key(&power_of_tone(329.63)), PitchClass::E);
    }

    #[test]
    fn concert_pitch_has_no_tuning_offset() {
        let tuning = estimate_tuning(&power_of_tone(440.0));
        assert!(tuning.abs() < 0.08, "tuning {}", tuning);
    }

    #[test]
    fn sharp_tone_is_measured() {
        // A quarter of a semitone above A4.
        let freq = 440.0 * 2f32.powf(0.25 / 12.0);
        let tuning = estimate_tuning(&power_of_tone(freq));
        assert!((tuning - 0.25).abs() < 0.08, "tuning {}", tuning);
        assert_eq!(estimate_key(&power_of_tone(freq)), PitchClass::A);
    }

    #[test]
    fn flat_tone_is_measured() {
        // Centred on FFT bin 38, about a quarter semitone below G#4.
        let freq = 38.0 * 22050.0 / 2048.0;
        let tuning = estimate_tuning(&power_of_tone(freq));
        assert!((tuning + 0.26).abs() < 0.05, "tuning {}", tuning);
        assert_eq!(estimate_key(&power_of_tone(freq)), PitchClass::GSharp);
    }

    #[test]
    fn silent_spectrum_has_no_tuning_offset() {
        let silent = Spectrogram::new(vec![vec![0.0; 1025]; 5], 22050, 2048);
        assert_eq!(estimate_tuning(&silent), 0.0);
    }

    #[test]
    fn silence_defaults_to_c() {
        let silent = Spectrogram::new(vec![vec![0.0; 1025]; 5], 22050, 2048);
        assert_eq!(estimate_key(&silent), PitchClass::C);
    }

    #[test]
    fn pitch_class_names_serialize_with_sharps() {
        let json = serde_json::to_string(&PitchClass::FSharp).unwrap();
        assert_eq!(json, "\"F#\"");
        let parsed: PitchClass = serde_json::from_str("\"A#\"").unwrap();
        assert_eq!(parsed, PitchClass::ASharp);
        assert_eq!(PitchClass::from_index(9).to_string(), "A");
    }
}
