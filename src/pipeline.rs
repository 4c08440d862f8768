use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::audio::analysis;
use crate::audio::decode::{self, Waveform};
use crate::audio::features::{round_to, AnalysisResult, DescriptorSet};
use crate::error::DecodeError;
use crate::metrics::UsageMetrics;
use crate::suggest::{self, Suggestion};

pub const STATUS_COMPLETED: &str = "completed";

/// Persisted document for one analysed input.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub file_id: String,
    pub features: AnalysisResult,
    pub suggestions: Vec<Suggestion>,
    pub status: &'static str,
    /// Wall-clock seconds spent decoding and analysing, rounded to 2 decimals
    pub processing_time: f64,
}

/// Runs extraction and suggestion generation, recording each call in the
/// shared metrics service.
#[derive(Clone, Debug)]
pub struct Analyzer {
    metrics: Arc<UsageMetrics>,
}

impl Analyzer {
    pub fn new(metrics: Arc<UsageMetrics>) -> Self {
        Self { metrics }
    }

    /// Decodes and analyses `path`. The report's `file_id` is the file stem.
    pub fn analyze(&self, path: &Path) -> Result<AnalysisReport, DecodeError> {
        let file_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("Analyzing {} ({})", path.display(), file_id);

        let start = Instant::now();
        let result =
            decode::decode_file(path).and_then(|waveform| analysis::analyze(&waveform));
        self.finish(file_id, start, result)
    }

    /// Analyses an already decoded waveform, resampling it first if needed.
    pub fn analyze_waveform(
        &self,
        file_id: &str,
        waveform: Waveform,
    ) -> Result<AnalysisReport, DecodeError> {
        let start = Instant::now();
        let result = waveform
            .into_analysis_rate()
            .and_then(|waveform| analysis::analyze(&waveform));
        self.finish(file_id.to_string(), start, result)
    }

    fn finish(
        &self,
        file_id: String,
        start: Instant,
        result: Result<AnalysisResult, DecodeError>,
    ) -> Result<AnalysisReport, DecodeError> {
        let features = match result {
            Ok(features) => features,
            Err(err) => {
                self.metrics.record_failure();
                log::warn!("Analysis of {} failed: {}", file_id, err);
                return Err(err);
            }
        };

        let elapsed = start.elapsed();
        self.metrics.record_analysis(elapsed);
        self.metrics.update_features_count(DescriptorSet::FIELD_COUNT);

        let suggestions = suggest::generate(Some(&features.extracted_features));
        Ok(AnalysisReport {
            file_id,
            features,
            suggestions,
            status: STATUS_COMPLETED,
            processing_time: round_to(elapsed.as_secs_f64(), 2),
        })
    }
}
