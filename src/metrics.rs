use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::audio::features::round_to;

/// Process-wide usage counters. Shared between workers behind an `Arc`.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    tracks_processed: AtomicU64,
    failed_analyses: AtomicU64,
    features_extracted: AtomicU64,
    processing_micros: AtomicU64,
}

/// Point-in-time view of [`UsageMetrics`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub tracks_processed: u64,
    pub failed_analyses: u64,
    pub features_extracted: u64,
    /// Seconds
    pub total_processing_time: f64,
    /// Seconds per processed track, rounded to 2 decimals
    pub average_processing_time: f64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analysis(&self, elapsed: Duration) {
        let total = self.tracks_processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        log::info!(
            "Analysis #{} completed in {:.2}s",
            total,
            elapsed.as_secs_f64()
        );
    }

    pub fn record_failure(&self) {
        self.failed_analyses.fetch_add(1, Ordering::Relaxed);
    }

    /// Raises the descriptor count; never lowers it.
    pub fn update_features_count(&self, count: usize) {
        let previous = self
            .features_extracted
            .fetch_max(count as u64, Ordering::Relaxed);
        if (count as u64) > previous {
            log::debug!("Features extracted per track: {}", count);
        }
    }

    pub fn snapshot(&self) -> MetricsSummary {
        let tracks = self.tracks_processed.load(Ordering::Relaxed);
        let total = self.processing_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let average = if tracks > 0 {
            round_to(total / tracks as f64, 2)
        } else {
            0.0
        };
        MetricsSummary {
            tracks_processed: tracks,
            failed_analyses: self.failed_analyses.load(Ordering::Relaxed),
            features_extracted: self.features_extracted.load(Ordering::Relaxed),
            total_processing_time: total,
            average_processing_time: average,
        }
    }
}
