//! Per-frame spectral shape statistics, each averaged over all frames.

use super::mel::{AMIN, TOP_DB};
use super::spectrum::Spectrogram;

/// Fraction of spectral magnitude below the rolloff frequency.
pub const ROLLOFF_FRACTION: f32 = 0.85;

/// Lower edge of the first octave band used for contrast.
pub const CONTRAST_FMIN: f32 = 200.0;
pub const CONTRAST_BANDS: usize = 6;
pub const CONTRAST_QUANTILE: f32 = 0.02;

/// Magnitude-weighted mean frequency.
pub fn centroid(spec: &Spectrogram) -> f64 {
    let freqs = spec.frequencies();
    mean_over_frames(spec, |frame| frame_centroid(frame, &freqs))
}

/// Frequency below which [`ROLLOFF_FRACTION`] of the magnitude lies.
pub fn rolloff(spec: &Spectrogram) -> f64 {
    let freqs = spec.frequencies();
    mean_over_frames(spec, |frame| {
        let total: f32 = frame.iter().sum();
        let threshold = ROLLOFF_FRACTION * total;
        let mut cumulative = 0.0f32;
        for (bin, &mag) in frame.iter().enumerate() {
            cumulative += mag;
            if cumulative >= threshold {
                return freqs[bin];
            }
        }
        freqs[freqs.len() - 1]
    })
}

/// Rolloff as a percentage of the Nyquist frequency.
pub fn rolloff_percent(spec: &Spectrogram) -> f64 {
    rolloff(spec) / spec.nyquist() as f64 * 100.0
}

/// Second-order spread of the normalised spectrum around its centroid.
pub fn bandwidth(spec: &Spectrogram) -> f64 {
    let freqs = spec.frequencies();
    mean_over_frames(spec, |frame| {
        let total: f32 = frame.iter().sum();
        if total <= f32::MIN_POSITIVE {
            return 0.0;
        }
        let center = frame_centroid(frame, &freqs);
        let spread: f32 = frame
            .iter()
            .zip(freqs.iter())
            .map(|(&mag, &f)| (mag / total) * (f - center).powi(2))
            .sum();
        spread.sqrt()
    })
}

/// Mean octave-band peak-to-valley ratio in decibels.
///
/// Bands are `[0, fmin]`, then octaves from `fmin`; the last band runs to
/// Nyquist. Peak and valley are the means of the top and bottom
/// [`CONTRAST_QUANTILE`] of each band's sorted magnitudes.
pub fn contrast(spec: &Spectrogram) -> f64 {
    let freqs = spec.frequencies();
    let bands = contrast_bands(&freqs);

    let mut peaks: Vec<Vec<f32>> = Vec::with_capacity(spec.num_frames());
    let mut valleys: Vec<Vec<f32>> = Vec::with_capacity(spec.num_frames());

    let mut sorted = Vec::new();
    for frame in spec.frames() {
        let mut frame_peaks = Vec::with_capacity(bands.len());
        let mut frame_valleys = Vec::with_capacity(bands.len());
        for band in &bands {
            sorted.clear();
            sorted.extend_from_slice(&frame[band.rows.clone()]);
            sorted.sort_by(|a, b| a.total_cmp(b));
            let n = band.take.min(sorted.len()).max(1);
            frame_valleys.push(sorted[..n].iter().sum::<f32>() / n as f32);
            frame_peaks.push(sorted[sorted.len() - n..].iter().sum::<f32>() / n as f32);
        }
        peaks.push(frame_peaks);
        valleys.push(frame_valleys);
    }

    let peak_db = clipped_db(&peaks);
    let valley_db = clipped_db(&valleys);

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (p_row, v_row) in peak_db.iter().zip(valley_db.iter()) {
        for (p, v) in p_row.iter().zip(v_row.iter()) {
            sum += (p - v) as f64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

struct ContrastBand {
    rows: std::ops::Range<usize>,
    take: usize,
}

fn contrast_bands(freqs: &[f32]) -> Vec<ContrastBand> {
    let mut edges = vec![0.0f32];
    edges.extend((0..=CONTRAST_BANDS).map(|i| CONTRAST_FMIN * 2f32.powi(i as i32)));

    let n_bins = freqs.len();
    let mut bands = Vec::with_capacity(CONTRAST_BANDS + 1);
    for (k, pair) in edges.windows(2).enumerate() {
        let (low, high) = (pair[0], pair[1]);
        let first = freqs.iter().position(|&f| f >= low).unwrap_or(n_bins - 1);
        let last = freqs.iter().rposition(|&f| f <= high).unwrap_or(first);

        // Each band borrows the bin just below it; the top band extends to Nyquist.
        let start = if k > 0 { first.saturating_sub(1) } else { first };
        let end = if k == CONTRAST_BANDS { n_bins } else { last + 1 };
        let selected = end.saturating_sub(start).max(1);

        let take = ((CONTRAST_QUANTILE * selected as f32).round_ties_even() as usize).max(1);
        let rows_end = if k < CONTRAST_BANDS { end.saturating_sub(1).max(start + 1) } else { end };
        bands.push(ContrastBand {
            rows: start..rows_end.min(n_bins),
            take,
        });
    }
    bands
}

fn clipped_db(values: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut db: Vec<Vec<f32>> = values
        .iter()
        .map(|row| row.iter().map(|&x| 10.0 * x.max(AMIN).log10()).collect())
        .collect();
    let max = db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    if max.is_finite() {
        for v in db.iter_mut().flatten() {
            *v = v.max(max - TOP_DB);
        }
    }
    db
}

fn frame_centroid(frame: &[f32], freqs: &[f32]) -> f32 {
    let total: f32 = frame.iter().sum();
    if total <= f32::MIN_POSITIVE {
        return 0.0;
    }
    frame
        .iter()
        .zip(freqs.iter())
        .map(|(&mag, &f)| f * mag)
        .sum::<f32>()
        / total
}

fn mean_over_frames(spec: &Spectrogram, per_frame: impl Fn(&[f32]) -> f32) -> f64 {
    let frames = spec.frames();
    if frames.is_empty() {
        return 0.0;
    }
    frames.iter().map(|f| per_frame(f) as f64).sum::<f64>() / frames.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::Stft;

    fn tone(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 22050.0).sin())
            .collect()
    }

    fn spectrogram(samples: &[f32]) -> Spectrogram {
        Stft::compute(samples, 22050).magnitude()
    }

    #[test]
    fn centroid_tracks_pure_tone() {
        let spec = spectrogram(&tone(3000.0, 22050));
        let c = centroid(&spec);
        assert!((c - 3000.0).abs() < 150.0, "centroid {}", c);
    }

    #[test]
    fn brighter_tone_has_higher_rolloff() {
        let low = rolloff_percent(&spectrogram(&tone(500.0, 22050)));
        let high = rolloff_percent(&spectrogram(&tone(6000.0, 22050)));
        assert!(low < high);
        assert!((0.0..=100.0).contains(&low));
        assert!((0.0..=100.0).contains(&high));
    }

    #[test]
    fn two_tones_are_wider_than_one() {
        let single = bandwidth(&spectrogram(&tone(1000.0, 22050)));
        let pair: Vec<f32> = tone(500.0, 22050)
            .iter()
            .zip(tone(5000.0, 22050))
            .map(|(a, b)| a + b)
            .collect();
        let double = bandwidth(&spectrogram(&pair));
        assert!(double > single, "{} <= {}", double, single);
    }

    #[test]
    fn tone_has_more_contrast_than_flat_spectrum() {
        let flat = Spectrogram::new(vec![vec![1.0; 1025]; 4], 22050, 2048);
        assert!(contrast(&flat).abs() < 1e-6);
        let tonal = contrast(&spectrogram(&tone(1000.0, 22050)));
        assert!(tonal > 5.0, "contrast {}", tonal);
    }

    #[test]
    fn contrast_bands_cover_the_spectrum() {
        let spec = Spectrogram::new(vec![vec![0.0; 1025]], 22050, 2048);
        let bands = contrast_bands(&spec.frequencies());
        assert_eq!(bands.len(), CONTRAST_BANDS + 1);
        assert_eq!(bands[0].rows.start, 0);
        assert_eq!(bands[CONTRAST_BANDS].rows.end, 1025);
        assert!(bands.iter().all(|b| b.take >= 1 && !b.rows.is_empty()));
    }

    #[test]
    fn silent_frames_report_zero() {
        let silent = Spectrogram::new(vec![vec![0.0; 1025]; 3], 22050, 2048);
        assert_eq!(centroid(&silent), 0.0);
        assert_eq!(bandwidth(&silent), 0.0);
        assert_eq!(rolloff(&silent), 0.0);
    }
}
