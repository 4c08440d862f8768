use super::mel::{power_to_db, MelFilterbank, N_MELS};
use super::spectrum::Spectrogram;

pub const N_MFCC: usize = 13;

/// First `n_mfcc` coefficients of an orthonormal DCT-II.
pub fn dct_ortho(input: &[f32], n_mfcc: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_mfcc];
    }
    let scale_first = (1.0 / n as f32).sqrt();
    let scale_rest = (2.0 / n as f32).sqrt();
    (0..n_mfcc)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x * (std::f32::consts::PI / n as f32 * (i as f32 + 0.5) * k as f32).cos()
                })
                .sum();
            sum * if k == 0 { scale_first } else { scale_rest }
        })
        .collect()
}

/// MFCC matrix, `[frame][coefficient]`, from a power spectrogram.
pub fn mfcc(power: &Spectrogram, n_mfcc: usize) -> Vec<Vec<f32>> {
    let bank = MelFilterbank::new(power.sample_rate(), power.n_fft(), N_MELS);
    let mel_db = power_to_db(&bank.project(power));
    mel_db.iter().map(|frame| dct_ortho(frame, n_mfcc)).collect()
}

/// Time-average of the zeroth cepstral coefficient.
pub fn mfcc_mean(power: &Spectrogram) -> f64 {
    let coefficients = mfcc(power, N_MFCC);
    if coefficients.is_empty() {
        return 0.0;
    }
    coefficients.iter().map(|c| c[0] as f64).sum::<f64>() / coefficients.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::Stft;

    #[test]
    fn dct_of_constant_only_has_dc() {
        let coeffs = dct_ortho(&[2.0; 16], 4);
        assert!((coeffs[0] - 2.0 * 4.0).abs() < 1e-4);
        for c in &coeffs[1..] {
            assert!(c.abs() < 1e-4);
        }
    }

    #[test]
    fn dct_preserves_energy() {
        let input: Vec<f32> = (0..8).map(|i| (i as f32 * 0.7).sin()).collect();
        let coeffs = dct_ortho(&input, 8);
        let e_in: f32 = input.iter().map(|x| x * x).sum();
        let e_out: f32 = coeffs.iter().map(|x| x * x).sum();
        assert!((e_in - e_out).abs() < 1e-4);
    }

    #[test]
    fn louder_signal_has_larger_first_coefficient() {
        let tone = |amp: f32| -> Vec<f32> {
            (0..11025)
                .map(|i| amp * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin())
                .collect()
        };
        let quiet = mfcc_mean(&Stft::compute(&tone(0.05), 22050).magnitude().squared());
        let loud = mfcc_mean(&Stft::compute(&tone(0.8), 22050).magnitude().squared());
        assert!(loud > quiet, "{} <= {}", loud, quiet);
        assert!(quiet.is_finite() && loud.is_finite());
    }

    #[test]
    fn frame_count_is_preserved() {
        let power = Spectrogram::new(vec![vec![1.0; 1025]; 7], 22050, 2048);
        let coeffs = mfcc(&power, N_MFCC);
        assert_eq!(coeffs.len(), 7);
        assert!(coeffs.iter().all(|c| c.len() == N_MFCC));
    }
}
