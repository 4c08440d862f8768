use mixlens::suggest::{self, generate_from_json, EXTRACTION_FAILED};
use mixlens::{generate_suggestions, Category, DescriptorSet, PitchClass, Tier};

fn features() -> DescriptorSet {
    DescriptorSet {
        tempo_bpm: 128.0,
        estimated_key: PitchClass::FSharp,
        rms_db: -10.0,
        lufs_approx: -33.0,
        spectral_centroid_hz: 2500.0,
        spectral_rolloff_percent: 70.0,
        zero_crossing_rate: 0.08,
        spectral_bandwidth_hz: 2200.0,
        dynamic_range_db: 12.0,
        spectral_contrast: 22.0,
        mfcc_mean: -150.0,
        harmonic_ratio: 0.7,
        percussive_ratio: 0.3,
    }
}

#[test]
fn favorable_mix_gets_positive_banner() {
    let out = generate_suggestions(&features());
    assert_eq!(
        out[0].text(),
        "🎉 **Overall**: Your mix shows strong technical qualities! Most parameters are within optimal ranges."
    );
    assert_eq!(
        out[1].text(),
        "✅ **Loudness**: Good level (RMS: -10.0 dB, LUFS approx: -33.0). Track has appropriate loudness for modern production."
    );
    assert_eq!(
        out[7].text(),
        "🎹 **Key Detection**: Estimated key is F#. Use this as a reference for harmonic mixing or adding complementary elements."
    );
}

#[test]
fn problem_mix_gets_specific_warnings() {
    let mut f = features();
    f.dynamic_range_db = 4.2;
    f.spectral_centroid_hz = 4500.4;
    f.spectral_rolloff_percent = 95.26;
    f.harmonic_ratio = 0.35;
    f.percussive_ratio = 0.65;

    let out = generate_suggestions(&f);
    assert!(out[0].text().starts_with("💡 **Overall**"));
    assert_eq!(out[2].category(), Category::DynamicRange);
    assert_eq!(out[2].tier(), Tier::WarningLow);
    assert!(out[2].text().contains("Very compressed (Range: 4.2 dB)"));
    assert!(out[3].text().contains("Bright mix (Centroid: 4500 Hz)"));
    assert!(out[4].text().contains("Extended high-end (Rolloff: 95.3%)"));
    assert!(out[5].text().contains("Low harmonic content (35.0%)"));
}

#[test]
fn tempo_extremes() {
    let mut f = features();
    f.tempo_bpm = 55.5;
    assert!(generate_suggestions(&f)[6].text().contains("Slow tempo (55.5 BPM)"));
    f.tempo_bpm = 60.0;
    assert!(generate_suggestions(&f)[6].is_favorable());
    f.tempo_bpm = 180.01;
    assert!(generate_suggestions(&f)[6].text().contains("Fast tempo (180.0 BPM)"));
}

#[test]
fn serialized_list_is_plain_strings() {
    let value = serde_json::to_value(generate_suggestions(&features())).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 8);
    assert!(items.iter().all(|v| v.is_string()));
}

#[test]
fn absent_input_yields_single_failure() {
    let out = suggest::generate(None);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text(), EXTRACTION_FAILED);

    let out = generate_from_json(&serde_json::json!({"duration_seconds": 3.0}));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text(), "Unable to extract features. Please check audio file.");
}
