use serde_json::Value;

use super::rules::{CATEGORY_ORDER, RULES};
use super::{Category, Suggestion, Tier};
use crate::audio::features::DescriptorSet;

pub const EXTRACTION_FAILED: &str = "Unable to extract features. Please check audio file.";

/// Share of categories that must be favorable for the positive banner.
const POSITIVE_SHARE: f64 = 0.7;

const POSITIVE_BANNER: &str =
    "Your mix shows strong technical qualities! Most parameters are within optimal ranges.";
const IMPROVEMENT_BANNER: &str = "Your mix has room for improvement in several areas. Focus on the suggestions below to enhance production quality.";

/// Builds the ordered suggestion list. `None` yields the single failure entry.
pub fn generate(features: Option<&DescriptorSet>) -> Vec<Suggestion> {
    let Some(features) = features else {
        return vec![extraction_failed()];
    };

    let mut suggestions: Vec<Suggestion> = CATEGORY_ORDER
        .iter()
        .filter_map(|&category| {
            RULES
                .iter()
                .filter(|rule| rule.category == category)
                .find(|rule| (rule.applies)(features))
                .map(|rule| Suggestion::new(category, rule.tier, &(rule.message)(features)))
        })
        .collect();

    let favorable = suggestions.iter().filter(|s| s.is_favorable()).count();
    log::debug!(
        "{} of {} categories favorable",
        favorable,
        CATEGORY_ORDER.len()
    );
    suggestions.insert(0, banner(favorable));
    suggestions
}

/// Accepts an analysis document and reads its `extracted_features` object.
/// A missing, empty, or malformed object yields the single failure entry.
pub fn generate_from_json(document: &Value) -> Vec<Suggestion> {
    let features = document
        .get("extracted_features")
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
        .and_then(|v| match serde_json::from_value::<DescriptorSet>(v.clone()) {
            Ok(features) => Some(features),
            Err(err) => {
                log::warn!("Ignoring malformed extracted_features: {}", err);
                None
            }
        });
    generate(features.as_ref())
}

fn banner(favorable: usize) -> Suggestion {
    if favorable as f64 >= CATEGORY_ORDER.len() as f64 * POSITIVE_SHARE {
        Suggestion::with_marker(Category::Overall, Tier::Info, "🎉", POSITIVE_BANNER)
    } else {
        Suggestion::with_marker(Category::Overall, Tier::Info, "💡", IMPROVEMENT_BANNER)
    }
}

fn extraction_failed() -> Suggestion {
    Suggestion::plain(Category::Overall, Tier::Info, EXTRACTION_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::chroma::PitchClass;

    fn balanced() -> DescriptorSet {
        DescriptorSet {
            tempo_bpm: 120.0,
            estimated_key: PitchClass::D,
            rms_db: -12.0,
            lufs_approx: -35.0,
            spectral_centroid_hz: 3000.0,
            spectral_rolloff_percent: 75.0,
            zero_crossing_rate: 0.05,
            spectral_bandwidth_hz: 2000.0,
            dynamic_range_db: 10.0,
            spectral_contrast: 20.0,
            mfcc_mean: -200.0,
            harmonic_ratio: 0.8,
            percussive_ratio: 0.2,
        }
    }

    #[test]
    fn one_entry_per_category_plus_banner() {
        let out = generate(Some(&balanced()));
        assert_eq!(out.len(), 8);
        assert_eq!(out[0].category(), Category::Overall);
        let categories: Vec<Category> = out[1..].iter().map(|s| s.category()).collect();
        assert_eq!(categories, CATEGORY_ORDER.to_vec());
        assert!(out[0].text().starts_with("🎉 **Overall**"));
    }

    #[test]
    fn threshold_comparisons_are_strict() {
        let mut f = balanced();
        f.rms_db = -20.0;
        assert!(generate(Some(&f))[1].is_favorable());
        f.rms_db = -20.01;
        let quiet = &generate(Some(&f))[1];
        assert_eq!(quiet.tier(), Tier::WarningLow);
        assert_eq!(
            quiet.text(),
            "🔊 **Loudness**: Track is quiet (RMS: -20.0 dB). Consider normalizing or increasing gain to improve perceived loudness."
        );
    }

    #[test]
    fn banner_threshold_at_five_of_seven() {
        // Five favorable categories.
        let mut f = balanced();
        f.rms_db = -3.0;
        assert!(generate(Some(&f))[0].text().starts_with("🎉"));

        // Four favorable categories.
        f.tempo_bpm = 200.0;
        assert!(generate(Some(&f))[0].text().starts_with("💡"));
    }

    #[test]
    fn key_detection_is_informational() {
        let out = generate(Some(&balanced()));
        let key = out.last().unwrap();
        assert_eq!(key.tier(), Tier::Info);
        assert!(key.text().contains("Estimated key is D."));
    }

    #[test]
    fn generation_is_deterministic() {
        let f = balanced();
        assert_eq!(generate(Some(&f)), generate(Some(&f)));
    }

    #[test]
    fn missing_features_yield_failure_entry() {
        assert_eq!(generate(None)[0].text(), EXTRACTION_FAILED);
        for doc in [
            serde_json::json!({}),
            serde_json::json!({"extracted_features": {}}),
            serde_json::json!({"extracted_features": {"rms_db": "loud"}}),
        ] {
            let out = generate_from_json(&doc);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].to_string(), EXTRACTION_FAILED);
        }
    }

    #[test]
    fn json_document_round_trips_into_rules() {
        let doc = serde_json::json!({ "extracted_features": balanced() });
        assert_eq!(generate_from_json(&doc), generate(Some(&balanced())));
    }
}
