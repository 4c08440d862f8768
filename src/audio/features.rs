use serde::{Deserialize, Serialize};

use super::chroma::PitchClass;

/// The fixed descriptor schema. Field names are the persisted JSON contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    /// Dominant tempo (BPM)
    pub tempo_bpm: f64,
    /// Pitch class with the most chroma energy
    pub estimated_key: PitchClass,
    /// Mean framed RMS in dB
    pub rms_db: f64,
    /// `rms_db` minus a fixed calibration offset
    pub lufs_approx: f64,
    pub spectral_centroid_hz: f64,
    /// 85 % rolloff as a percentage of Nyquist
    pub spectral_rolloff_percent: f64,
    pub zero_crossing_rate: f64,
    pub spectral_bandwidth_hz: f64,
    /// Peak dB minus RMS dB
    pub dynamic_range_db: f64,
    pub spectral_contrast: f64,
    /// Mean of the zeroth MFCC
    pub mfcc_mean: f64,
    /// Harmonic share of separated amplitude (0.0-1.0)
    pub harmonic_ratio: f64,
    /// Percussive share of separated amplitude (0.0-1.0)
    pub percussive_ratio: f64,
}

impl DescriptorSet {
    pub const FIELD_COUNT: usize = 13;

    /// Applies the per-field output precision.
    pub fn rounded(&self) -> DescriptorSet {
        DescriptorSet {
            tempo_bpm: round_to(self.tempo_bpm, 2),
            estimated_key: self.estimated_key,
            rms_db: round_to(self.rms_db, 2),
            lufs_approx: round_to(self.lufs_approx, 2),
            spectral_centroid_hz: round_to(self.spectral_centroid_hz, 2),
            spectral_rolloff_percent: round_to(self.spectral_rolloff_percent, 2),
            zero_crossing_rate: round_to(self.zero_crossing_rate, 4),
            spectral_bandwidth_hz: round_to(self.spectral_bandwidth_hz, 2),
            dynamic_range_db: round_to(self.dynamic_range_db, 2),
            spectral_contrast: round_to(self.spectral_contrast, 2),
            mfcc_mean: round_to(self.mfcc_mean, 2),
            harmonic_ratio: round_to(self.harmonic_ratio, 3),
            percussive_ratio: round_to(self.percussive_ratio, 3),
        }
    }

    /// Name and value of every numeric field, in schema order.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 12] {
        [
            ("tempo_bpm", self.tempo_bpm),
            ("rms_db", self.rms_db),
            ("lufs_approx", self.lufs_approx),
            ("spectral_centroid_hz", self.spectral_centroid_hz),
            ("spectral_rolloff_percent", self.spectral_rolloff_percent),
            ("zero_crossing_rate", self.zero_crossing_rate),
            ("spectral_bandwidth_hz", self.spectral_bandwidth_hz),
            ("dynamic_range_db", self.dynamic_range_db),
            ("spectral_contrast", self.spectral_contrast),
            ("mfcc_mean", self.mfcc_mean),
            ("harmonic_ratio", self.harmonic_ratio),
            ("percussive_ratio", self.percussive_ratio),
        ]
    }
}

/// Basic signal metadata carried next to the descriptors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub length_samples: usize,
    pub peak_amplitude: f64,
    pub peak_db: f64,
}

/// Output of one extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub extracted_features: DescriptorSet,
    pub audio_data: AudioMetadata,
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
