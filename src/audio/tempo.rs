//! Onset strength, global tempo estimation and dynamic-programming beat tracking.

use rustfft::{num_complex::Complex, FftPlanner};

use super::mel::{power_to_db, MelFilterbank, N_MELS};
use super::spectrum::{hann_window, Spectrogram};

/// Centre of the log-normal tempo prior.
pub const START_BPM: f64 = 120.0;
/// Width of the prior in octaves.
pub const STD_BPM: f64 = 1.0;
pub const MAX_TEMPO: f64 = 320.0;
/// Seconds of onset envelope per autocorrelation window.
pub const AC_SIZE_SECS: f64 = 8.0;
/// How strongly beat spacing is held to the tempo period.
pub const TIGHTNESS: f64 = 100.0;

/// Dominant tempo and the beat grid that follows it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    /// Strictly increasing frame indices.
    pub beat_frames: Vec<usize>,
}

/// Runs onset detection, tempo estimation and beat tracking on a power spectrogram.
pub fn beat_track(power: &Spectrogram, hop: usize) -> TempoEstimate {
    let envelope = onset_strength(power, hop);
    if envelope.iter().all(|&v| v == 0.0) {
        log::debug!("Onset envelope is flat, no tempo");
        return TempoEstimate::default();
    }

    let sample_rate = power.sample_rate();
    let bpm = estimate_tempo(&envelope, sample_rate, hop);
    let frame_rate = sample_rate as f64 / hop as f64;
    let beat_frames = track_beats(&envelope, bpm, frame_rate);

    log::debug!("Tempo {:.2} BPM, {} beats", bpm, beat_frames.len());
    TempoEstimate { bpm, beat_frames }
}

/// Mean positive first difference of the dB mel spectrogram, one value per frame.
pub fn onset_strength(power: &Spectrogram, hop: usize) -> Vec<f32> {
    let bank = MelFilterbank::new(power.sample_rate(), power.n_fft(), N_MELS);
    let mel_db = power_to_db(&bank.project(power));
    let n_frames = mel_db.len();

    // Compensates for the one-frame lag and for centred framing.
    let shift = 1 + power.n_fft() / (2 * hop);
    let mut envelope = vec![0.0f32; shift.min(n_frames)];
    envelope.extend(mel_db.windows(2).map(|pair| {
        let rise: f32 = pair[1]
            .iter()
            .zip(pair[0].iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        rise / pair[1].len().max(1) as f32
    }));
    envelope.truncate(n_frames);
    envelope
}

/// Tempo from the mean autocorrelation tempogram weighted by a log-normal prior.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize) -> f64 {
    let win_length = ((AC_SIZE_SECS * sample_rate as f64) as usize / hop).max(2);
    let tempogram = mean_tempogram(envelope, win_length);

    let mut best_lag = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (lag, &strength) in tempogram.iter().enumerate().skip(1) {
        let bpm = lag_to_bpm(lag, sample_rate, hop);
        if bpm >= MAX_TEMPO {
            continue;
        }
        let prior = -0.5 * ((bpm.log2() - START_BPM.log2()) / STD_BPM).powi(2);
        let score = (1e6 * strength as f64).ln_1p() + prior;
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return 0.0;
    }
    lag_to_bpm(best_lag, sample_rate, hop)
}

fn lag_to_bpm(lag: usize, sample_rate: u32, hop: usize) -> f64 {
    60.0 * sample_rate as f64 / (hop as f64 * lag as f64)
}

/// Windowed local autocorrelation of the envelope, max-normalised per frame and averaged.
fn mean_tempogram(envelope: &[f32], win_length: usize) -> Vec<f32> {
    let n = envelope.len();
    let padded = pad_linear_ramp(envelope, win_length / 2);
    let window = hann_window(win_length);

    let fft_len = (2 * win_length - 1).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut mean = vec![0.0f32; win_length];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_len];

    for t in 0..n {
        let Some(segment) = padded.get(t..t + win_length) else {
            break;
        };
        for (slot, (i, &v)) in buffer.iter_mut().zip(segment.iter().enumerate()) {
            *slot = Complex::new(v * window[i], 0.0);
        }
        for slot in buffer[win_length..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        forward.process(&mut buffer);
        for c in buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        inverse.process(&mut buffer);

        let peak = buffer[..win_length]
            .iter()
            .map(|c| c.re.abs())
            .fold(0.0f32, f32::max);
        if peak > f32::MIN_POSITIVE {
            for (acc, c) in mean.iter_mut().zip(buffer[..win_length].iter()) {
                *acc += c.re / peak;
            }
        }
    }

    let count = n.max(1) as f32;
    mean.iter_mut().for_each(|v| *v /= count);
    mean
}

/// Pads `pad` values on each side ramping linearly from zero to the edge value.
fn pad_linear_ramp(values: &[f32], pad: usize) -> Vec<f32> {
    let first = values.first().copied().unwrap_or(0.0);
    let last = values.last().copied().unwrap_or(0.0);
    let mut out = Vec::with_capacity(values.len() + 2 * pad);
    out.extend((0..pad).map(|i| first * i as f32 / pad as f32));
    out.extend_from_slice(values);
    out.extend((0..pad).map(|j| last * (pad - 1 - j) as f32 / pad as f32));
    out
}

/// Dynamic-programming beat tracker over the onset envelope.
pub fn track_beats(envelope: &[f32], bpm: f64, frame_rate: f64) -> Vec<usize> {
    if bpm <= 0.0 || envelope.is_empty() {
        return Vec::new();
    }
    let period = (60.0 * frame_rate / bpm).round().max(1.0) as usize;

    let local = local_score(&normalize_onsets(envelope), period);
    let (backlink, cumulative) = beat_dp(&local, period, TIGHTNESS);

    let mut beats = vec![last_beat(&cumulative)];
    while let Some(prev) = backlink[beats[beats.len() - 1]] {
        beats.push(prev);
    }
    beats.reverse();

    trim_beats(&local, &beats)
}

fn normalize_onsets(envelope: &[f32]) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let variance = if n > 1 {
        envelope
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64
    } else {
        0.0
    };
    let norm = variance.sqrt() + f64::MIN_POSITIVE;
    envelope.iter().map(|&v| v as f64 / norm).collect()
}

fn local_score(onsets: &[f64], period: usize) -> Vec<f64> {
    let p = period as f64;
    let window: Vec<f64> = (-(period as i64)..=period as i64)
        .map(|i| (-0.5 * (i as f64 * 32.0 / p).powi(2)).exp())
        .collect();
    convolve_same(onsets, &window)
}

/// `same`-mode convolution with an odd-length kernel.
fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len() as isize;
    let center = (kernel.len() / 2) as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + center - j as isize;
                    (0..n).contains(&idx).then(|| signal[idx as usize] * w)
                })
                .sum()
        })
        .collect()
}

fn beat_dp(local: &[f64], period: usize, tightness: f64) -> (Vec<Option<usize>>, Vec<f64>) {
    let n = local.len();
    let mut backlink = vec![None; n];
    let mut cumulative = vec![0.0f64; n];

    let threshold = 0.01 * local.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let far = 2 * period;
    let near = ((period as f64) / 2.0).round() as usize;
    let log_period = (period as f64).ln();

    let mut first_beat = true;
    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;
        if i >= near.max(1) {
            let lo = i.saturating_sub(far);
            let hi = i - near.max(1);
            for loc in lo..=hi {
                let gap = (i - loc) as f64;
                let score = cumulative[loc] - tightness * (gap.ln() - log_period).powi(2);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((loc, score));
                }
            }
        }

        cumulative[i] = local[i] + best.map_or(0.0, |(_, s)| s);

        if first_beat && local[i] < threshold {
            backlink[i] = None;
        } else {
            backlink[i] = best.map(|(loc, _)| loc);
            first_beat = false;
        }
    }

    (backlink, cumulative)
}

/// Last local maximum of the cumulative score above half the median peak.
fn last_beat(cumulative: &[f64]) -> usize {
    let n = cumulative.len();
    let is_max = |i: usize| {
        let left = if i == 0 { cumulative[0] } else { cumulative[i - 1] };
        let right = if i + 1 == n { cumulative[i] } else { cumulative[i + 1] };
        cumulative[i] > left && cumulative[i] >= right
    };

    let mut peaks: Vec<f64> = (0..n).filter(|&i| is_max(i)).map(|i| cumulative[i]).collect();
    if peaks.is_empty() {
        return n - 1;
    }
    peaks.sort_by(|a, b| a.total_cmp(b));
    let mid = peaks.len() / 2;
    let median = if peaks.len() % 2 == 0 {
        (peaks[mid - 1] + peaks[mid]) / 2.0
    } else {
        peaks[mid]
    };

    (0..n)
        .rev()
        .find(|&i| is_max(i) && cumulative[i] * 2.0 > median)
        .unwrap_or(n - 1)
}

/// Drops weak leading and trailing beats.
fn trim_beats(local: &[f64], beats: &[usize]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let strengths: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let smooth = convolve_same(&strengths, &[0.0, 0.5, 1.0, 0.5, 0.0]);
    let rms = (smooth.iter().map(|v| v * v).sum::<f64>() / smooth.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let first = smooth.iter().position(|&v| v > threshold);
    let last = smooth.iter().rposition(|&v| v > threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..last].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::{Stft, HOP_SIZE};

    fn click_track(bpm: f64, seconds: f64) -> Vec<f32> {
        let sr = 22050.0;
        let mut samples = vec![0.0f32; (sr * seconds) as usize];
        let interval = (sr * 60.0 / bpm) as usize;
        for start in (0..samples.len() - 1).step_by(interval) {
            samples[start] = 0.9;
            samples[start + 1] = -0.5;
        }
        samples
    }

    fn power(samples: &[f32]) -> Spectrogram {
        Stft::compute(samples, 22050).magnitude().squared()
    }

    #[test]
    fn click_track_tempo_is_recovered() {
        let estimate = beat_track(&power(&click_track(120.0, 10.0)), HOP_SIZE);
        let bpm = estimate.bpm;
        // Octave errors are tolerated by the prior only around 120.
        assert!((bpm - 120.0).abs() < 6.0, "bpm {}", bpm);
        assert!(estimate.beat_frames.len() >= 10);
    }

    #[test]
    fn beats_are_strictly_increasing() {
        let estimate = beat_track(&power(&click_track(100.0, 8.0)), HOP_SIZE);
        assert!(estimate
            .beat_frames
            .windows(2)
            .all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn silence_has_no_tempo() {
        let estimate = beat_track(&power(&vec![0.0f32; 22050]), HOP_SIZE);
        assert_eq!(estimate, TempoEstimate::default());
    }

    #[test]
    fn envelope_matches_frame_count() {
        let spec = power(&click_track(90.0, 3.0));
        let envelope = onset_strength(&spec, HOP_SIZE);
        assert_eq!(envelope.len(), spec.num_frames());
        assert!(envelope.iter().all(|&v| v >= 0.0));
        assert_eq!(&envelope[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn linear_ramp_padding() {
        let padded = pad_linear_ramp(&[4.0, 2.0], 2);
        assert_eq!(padded, vec![0.0, 2.0, 4.0, 2.0, 1.0, 0.0]);
    }
}
