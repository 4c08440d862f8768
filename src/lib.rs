//! # mixlens
//!
//! Offline mix analysis for finished audio tracks: a fixed set of loudness,
//! spectral, rhythmic and tonal descriptors, plus rule-based production
//! feedback derived from them.
//!
//! ## Features
//!
//! - **Decoding**: WAV, MP3, FLAC, AAC/M4A and Ogg via symphonia, downmixed to mono and resampled to 22050 Hz
//! - **Descriptors**: RMS/LUFS-style loudness, dynamic range, spectral centroid, rolloff, bandwidth and contrast, zero-crossing rate, MFCC mean
//! - **Rhythm and tonality**: tempo from an onset autocorrelation, dominant pitch class from chroma
//! - **Separation**: harmonic/percussive balance via median-filter HPSS
//! - **Suggestions**: deterministic feedback from a static rule table
//!
//! ## Quick Start
//!
//! ```no_run
//! use mixlens::{extract, generate_suggestions};
//!
//! let result = extract("mix.wav")?;
//! println!("Tempo: {:.1} BPM, key {}", result.extracted_features.tempo_bpm, result.extracted_features.estimated_key);
//!
//! for suggestion in generate_suggestions(&result.extracted_features) {
//!     println!("{}", suggestion);
//! }
//! # Ok::<(), mixlens::DecodeError>(())
//! ```

#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod suggest;

use std::path::Path;

pub use audio::chroma::PitchClass;
pub use audio::decode::{Waveform, ANALYSIS_SAMPLE_RATE};
pub use audio::features::{AnalysisResult, AudioMetadata, DescriptorSet};
pub use error::DecodeError;
pub use metrics::{MetricsSummary, UsageMetrics};
pub use pipeline::{AnalysisReport, Analyzer};
pub use suggest::{Category, Suggestion, Tier};

/// Decodes `path` and computes every descriptor.
///
/// # Errors
///
/// Returns `DecodeError` if the file cannot be opened or decoded, holds no
/// samples, is entirely silent, or produces a non-finite descriptor.
pub fn extract(path: impl AsRef<Path>) -> Result<AnalysisResult, DecodeError> {
    let waveform = audio::decode::decode_file(path.as_ref())?;
    audio::analysis::analyze(&waveform)
}

/// Same as [`extract`] for an in-memory encoded file. `extension` is a
/// container hint such as `"mp3"`.
pub fn extract_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<AnalysisResult, DecodeError> {
    let waveform = audio::decode::decode_bytes(bytes, extension)?;
    audio::analysis::analyze(&waveform)
}

/// Computes descriptors for an already decoded mono waveform, resampling to
/// [`ANALYSIS_SAMPLE_RATE`] first when needed.
pub fn extract_waveform(waveform: &Waveform) -> Result<AnalysisResult, DecodeError> {
    if waveform.sample_rate() == ANALYSIS_SAMPLE_RATE {
        return audio::analysis::analyze(waveform);
    }
    let resampled = waveform.clone().into_analysis_rate()?;
    audio::analysis::analyze(&resampled)
}

/// Rule-based feedback for a complete descriptor set. Never fails.
pub fn generate_suggestions(features: &DescriptorSet) -> Vec<Suggestion> {
    suggest::generate(Some(features))
}
