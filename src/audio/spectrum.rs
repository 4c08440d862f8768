//! Framing and short-time Fourier transforms shared by every spectral descriptor.

use rustfft::{num_complex::Complex, FftPlanner};

pub const FFT_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;

/// How the signal is extended before centred framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    Zero,
    Edge,
}

/// Pads `frame_len / 2` samples on both sides so frame `t` is centred on sample `t * hop`.
pub fn pad_centered(samples: &[f32], frame_len: usize, mode: PadMode) -> Vec<f32> {
    let pad = frame_len / 2;
    let (head, tail) = match mode {
        PadMode::Zero => (0.0, 0.0),
        PadMode::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, head);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + 2 * pad, tail);
    padded
}

/// Number of centred frames covering `num_samples`.
pub fn frame_count(num_samples: usize, hop: usize) -> usize {
    1 + num_samples / hop
}

/// Iterates `count` frames of `frame_len` over a signal already padded by [`pad_centered`].
pub fn frames(
    padded: &[f32],
    frame_len: usize,
    hop: usize,
    count: usize,
) -> impl Iterator<Item = &[f32]> + '_ {
    (0..count).map(move |t| &padded[t * hop..t * hop + frame_len])
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Complex STFT, `FFT_SIZE / 2 + 1` bins per frame.
#[derive(Clone, Debug)]
pub struct Stft {
    frames: Vec<Vec<Complex<f32>>>,
    sample_rate: u32,
    n_fft: usize,
    hop: usize,
}

impl Stft {
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        Self::with_params(samples, sample_rate, FFT_SIZE, HOP_SIZE)
    }

    pub fn with_params(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window = hann_window(n_fft);
        let half = n_fft / 2 + 1;

        let padded = pad_centered(samples, n_fft, PadMode::Zero);
        let count = frame_count(samples.len(), hop);

        let frames = frames(&padded, n_fft, hop, count)
            .map(|frame| {
                let mut buffer: Vec<Complex<f32>> = frame
                    .iter()
                    .zip(window.iter())
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                fft.process(&mut buffer);
                buffer.truncate(half);
                buffer
            })
            .collect();

        Self {
            frames,
            sample_rate,
            n_fft,
            hop,
        }
    }

    pub fn from_frames(
        frames: Vec<Vec<Complex<f32>>>,
        sample_rate: u32,
        n_fft: usize,
        hop: usize,
    ) -> Self {
        Self {
            frames,
            sample_rate,
            n_fft,
            hop,
        }
    }

    pub fn frames(&self) -> &[Vec<Complex<f32>>] {
        &self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn magnitude(&self) -> Spectrogram {
        Spectrogram {
            frames: self
                .frames
                .iter()
                .map(|frame| frame.iter().map(|c| c.norm()).collect())
                .collect(),
            sample_rate: self.sample_rate,
            n_fft: self.n_fft,
        }
    }

    /// Inverse STFT by windowed overlap-add, trimmed to `length` samples.
    pub fn inverse(&self, length: usize) -> Vec<f32> {
        let n_fft = self.n_fft;
        let hop = self.hop;
        if self.frames.is_empty() {
            return vec![0.0; length];
        }

        let mut planner = FftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(n_fft);
        let window = hann_window(n_fft);

        let total = n_fft + hop * (self.frames.len() - 1);
        let mut output = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let scale = 1.0 / n_fft as f32;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        for (t, frame) in self.frames.iter().enumerate() {
            // Rebuild the full Hermitian spectrum from the positive half.
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < frame.len() {
                    frame[k]
                } else {
                    frame[n_fft - k].conj()
                };
            }
            ifft.process(&mut buffer);

            let start = t * hop;
            for i in 0..n_fft {
                output[start + i] += buffer[i].re * scale * window[i];
                window_sum[start + i] += window[i] * window[i];
            }
        }

        for (sample, &norm) in output.iter_mut().zip(window_sum.iter()) {
            if norm > 1e-8 {
                *sample /= norm;
            }
        }

        let pad = n_fft / 2;
        let mut trimmed: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        trimmed.resize(length, 0.0);
        trimmed
    }
}

/// Real-valued spectrogram laid out as `frames[t][bin]`.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    sample_rate: u32,
    n_fft: usize,
}

impl Spectrogram {
    pub fn new(frames: Vec<Vec<f32>>, sample_rate: u32, n_fft: usize) -> Self {
        Self {
            frames,
            sample_rate,
            n_fft,
        }
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Centre frequency of every bin in Hz.
    pub fn frequencies(&self) -> Vec<f32> {
        let resolution = self.sample_rate as f32 / self.n_fft as f32;
        (0..self.num_bins()).map(|k| k as f32 * resolution).collect()
    }

    /// Element-wise square, turning a magnitude spectrogram into a power one.
    pub fn squared(&self) -> Spectrogram {
        Spectrogram {
            frames: self
                .frames
                .iter()
                .map(|frame| frame.iter().map(|x| x * x).collect())
                .collect(),
            sample_rate: self.sample_rate,
            n_fft: self.n_fft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn frame_count_matches_centered_framing() {
        assert_eq!(frame_count(0, 512), 1);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(512, 512), 2);
        assert_eq!(frame_count(110250, 512), 216);
    }

    #[test]
    fn edge_padding_repeats_boundaries() {
        let padded = pad_centered(&[1.0, 2.0, 3.0], 4, PadMode::Edge);
        assert_eq!(padded, vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
        let zero = pad_centered(&[1.0], 4, PadMode::Zero);
        assert_eq!(zero, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn sine_energy_lands_in_expected_bin() {
        let sr = 22050;
        let stft = Stft::compute(&sine(1000.0, sr, 8192), sr);
        let mag = stft.magnitude();
        let frame = &mag.frames()[mag.num_frames() / 2];
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let freq = mag.frequencies()[peak_bin];
        assert!((freq - 1000.0).abs() < 15.0, "peak at {} Hz", freq);
    }

    #[test]
    fn inverse_reconstructs_signal() {
        let sr = 22050;
        let signal: Vec<f32> = sine(440.0, sr, 6000)
            .iter()
            .zip(sine(3000.0, sr, 6000))
            .map(|(a, b)| 0.5 * a + 0.25 * b)
            .collect();
        let stft = Stft::compute(&signal, sr);
        let rebuilt = stft.inverse(signal.len());
        assert_eq!(rebuilt.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(rebuilt.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max reconstruction error {}", max_err);
    }
}
