use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// The single failure type of the extraction pipeline.
///
/// Everything that prevents a complete descriptor set from being produced ends
/// up here, including numeric failures inside a transform.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open audio file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to probe audio format")]
    Probe(#[source] SymphoniaError),

    #[error("no decodable audio track found")]
    NoTrack,

    #[error("audio track does not declare a sample rate")]
    UnknownSampleRate,

    #[error("failed to decode audio stream")]
    Codec(#[source] SymphoniaError),

    #[error("failed to resample audio from {from} Hz")]
    Resample {
        from: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("audio contains no samples")]
    Empty,

    #[error("audio is entirely silent")]
    Silent,

    #[error("{descriptor} produced a non-finite value")]
    Computation { descriptor: &'static str },
}
