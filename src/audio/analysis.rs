use super::chroma;
use super::decode::Waveform;
use super::features::{round_to, AnalysisResult, AudioMetadata, DescriptorSet};
use super::hpss;
use super::mfcc;
use super::spectral;
use super::spectrum::Stft;
use super::tempo;
use super::temporal;
use crate::error::DecodeError;

/// Computes every descriptor for a waveform already at the analysis rate.
///
/// Silent input is rejected before any transform runs, and a non-finite value
/// from any descriptor fails the whole call.
pub fn analyze(waveform: &Waveform) -> Result<AnalysisResult, DecodeError> {
    let samples = waveform.samples();
    let sr = waveform.sample_rate();

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    let peak = temporal::peak_amplitude(samples);
    if peak == 0.0 {
        return Err(DecodeError::Silent);
    }
    if !peak.is_finite() {
        return Err(DecodeError::Computation {
            descriptor: "peak_amplitude",
        });
    }

    log::info!("Pass 1: Time-domain statistics...");
    let rms_db = temporal::amplitude_to_db(temporal::mean_rms(samples));
    let peak_db = temporal::amplitude_to_db(peak as f64);
    let zero_crossing_rate = temporal::zero_crossing_rate(samples);

    log::info!("Pass 2: Spectral shape...");
    let stft = Stft::compute(samples, sr);
    let magnitude = stft.magnitude();
    let power = magnitude.squared();
    let spectral_centroid_hz = spectral::centroid(&magnitude);
    let spectral_rolloff_percent = spectral::rolloff_percent(&magnitude);
    let spectral_bandwidth_hz = spectral::bandwidth(&magnitude);
    let spectral_contrast = spectral::contrast(&magnitude);
    let mfcc_mean = mfcc::mfcc_mean(&power);

    log::info!("Pass 3: Tempo and key...");
    let tempo = tempo::beat_track(&power, stft.hop());
    let estimated_key = chroma::estimate_key(&power);

    log::info!("Pass 4: Harmonic/percussive separation...");
    let ratios = hpss::separate(&stft, samples.len()).ratios();

    let raw = DescriptorSet {
        tempo_bpm: tempo.bpm,
        estimated_key,
        rms_db,
        lufs_approx: temporal::lufs_approx(rms_db),
        spectral_centroid_hz,
        spectral_rolloff_percent,
        zero_crossing_rate,
        spectral_bandwidth_hz,
        dynamic_range_db: temporal::dynamic_range_db(peak_db, rms_db),
        spectral_contrast,
        mfcc_mean,
        harmonic_ratio: ratios.harmonic,
        percussive_ratio: ratios.percussive,
    };

    for (descriptor, value) in raw.numeric_fields() {
        log::debug!("{} = {}", descriptor, value);
        if !value.is_finite() {
            return Err(DecodeError::Computation { descriptor });
        }
    }

    let features = raw.rounded();
    log::info!(
        "Descriptors: tempo={:.2} BPM, key={}, rms={:.2} dB, centroid={:.0} Hz, harmonic={:.3}",
        features.tempo_bpm,
        features.estimated_key,
        features.rms_db,
        features.spectral_centroid_hz,
        features.harmonic_ratio
    );

    Ok(AnalysisResult {
        duration_seconds: round_to(waveform.duration_secs(), 2),
        sample_rate: sr,
        extracted_features: features,
        audio_data: AudioMetadata {
            length_samples: samples.len(),
            peak_amplitude: round_to(peak as f64, 4),
            peak_db: round_to(peak_db, 2),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::chroma::PitchClass;
    use crate::audio::decode::ANALYSIS_SAMPLE_RATE;

    fn tone(freq: f32, amplitude: f32, seconds: f32) -> Waveform {
        let sr = ANALYSIS_SAMPLE_RATE;
        let samples = (0..(sr as f32 * seconds) as usize)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        Waveform::new(samples, sr)
    }

    #[test]
    fn silence_is_rejected() {
        let err = analyze(&Waveform::new(vec![0.0; 22050], ANALYSIS_SAMPLE_RATE)).unwrap_err();
        assert!(matches!(err, DecodeError::Silent));
    }

    #[test]
    fn empty_is_rejected() {
        let err = analyze(&Waveform::new(Vec::new(), ANALYSIS_SAMPLE_RATE)).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn non_finite_samples_are_a_computation_error() {
        let mut samples = vec![0.1f32; 4096];
        samples[100] = f32::NAN;
        samples[200] = f32::INFINITY;
        let err = analyze(&Waveform::new(samples, ANALYSIS_SAMPLE_RATE)).unwrap_err();
        assert!(matches!(err, DecodeError::Computation { .. }), "{:?}", err);
    }

    #[test]
    fn sine_metadata_and_loudness() {
        let amplitude = 10f32.powf(-12.0 / 20.0);
        let result = analyze(&tone(440.0, amplitude, 2.0)).unwrap();
        assert_eq!(result.sample_rate, ANALYSIS_SAMPLE_RATE);
        assert_eq!(result.audio_data.length_samples, 44100);
        assert_eq!(result.duration_seconds, 2.0);
        assert!((result.audio_data.peak_db + 12.0).abs() < 0.05);

        let f = &result.extracted_features;
        assert_eq!(f.estimated_key, PitchClass::A);
        // A sine's crest factor is 3 dB; framing at the edges adds a little.
        assert!(f.dynamic_range_db > 2.5 && f.dynamic_range_db < 4.5, "{}", f.dynamic_range_db);
        assert!((f.lufs_approx - (f.rms_db - 23.0)).abs() <= 0.011);
    }
}
