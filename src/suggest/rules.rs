use super::{Category, Tier};
use crate::audio::features::DescriptorSet;

pub const QUIET_RMS_DB: f64 = -20.0;
pub const LOUD_RMS_DB: f64 = -6.0;
pub const COMPRESSED_RANGE_DB: f64 = 6.0;
pub const WIDE_RANGE_DB: f64 = 20.0;
pub const DARK_CENTROID_HZ: f64 = 2000.0;
pub const BRIGHT_CENTROID_HZ: f64 = 4000.0;
pub const DULL_ROLLOFF_PERCENT: f64 = 60.0;
pub const EXTENDED_ROLLOFF_PERCENT: f64 = 90.0;
pub const LOW_HARMONIC_RATIO: f64 = 0.5;
pub const SLOW_TEMPO_BPM: f64 = 60.0;
pub const FAST_TEMPO_BPM: f64 = 180.0;

/// Order in which categories appear after the banner.
pub const CATEGORY_ORDER: [Category; 7] = [
    Category::Loudness,
    Category::DynamicRange,
    Category::FrequencyBalance,
    Category::HighFrequencyContent,
    Category::HarmonicContent,
    Category::Tempo,
    Category::KeyDetection,
];

pub struct Rule {
    pub category: Category,
    pub tier: Tier,
    pub applies: fn(&DescriptorSet) -> bool,
    pub message: fn(&DescriptorSet) -> String,
}

fn always(_: &DescriptorSet) -> bool {
    true
}

/// Within a category the first matching rule wins; the last rule of each
/// category always matches.
pub const RULES: &[Rule] = &[
    Rule {
        category: Category::Loudness,
        tier: Tier::WarningLow,
        applies: |f| f.rms_db < QUIET_RMS_DB,
        message: |f| {
            format!(
                "Track is quiet (RMS: {:.1} dB). Consider normalizing or increasing gain to improve perceived loudness.",
                f.rms_db
            )
        },
    },
    Rule {
        category: Category::Loudness,
        tier: Tier::WarningHigh,
        applies: |f| f.rms_db > LOUD_RMS_DB,
        message: |f| {
            format!(
                "Track may be too loud (RMS: {:.1} dB). Watch for clipping and consider reducing gain slightly.",
                f.rms_db
            )
        },
    },
    Rule {
        category: Category::Loudness,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "Good level (RMS: {:.1} dB, LUFS approx: {:.1}). Track has appropriate loudness for modern production.",
                f.rms_db, f.lufs_approx
            )
        },
    },
    Rule {
        category: Category::DynamicRange,
        tier: Tier::WarningLow,
        applies: |f| f.dynamic_range_db < COMPRESSED_RANGE_DB,
        message: |f| {
            format!(
                "Very compressed (Range: {:.1} dB). Consider easing compression to preserve more natural dynamics and musicality.",
                f.dynamic_range_db
            )
        },
    },
    Rule {
        category: Category::DynamicRange,
        tier: Tier::WarningHigh,
        applies: |f| f.dynamic_range_db > WIDE_RANGE_DB,
        message: |f| {
            format!(
                "Wide dynamics (Range: {:.1} dB). Good for dynamic music, but ensure consistency for streaming platforms.",
                f.dynamic_range_db
            )
        },
    },
    Rule {
        category: Category::DynamicRange,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "Balanced (Range: {:.1} dB). Good balance between dynamics and consistency.",
                f.dynamic_range_db
            )
        },
    },
    Rule {
        category: Category::FrequencyBalance,
        tier: Tier::WarningLow,
        applies: |f| f.spectral_centroid_hz < DARK_CENTROID_HZ,
        message: |f| {
            format!(
                "Low-end heavy (Centroid: {:.0} Hz). Mix may lack clarity in the mid/high frequencies. Consider boosting presence or reducing low-end.",
                f.spectral_centroid_hz
            )
        },
    },
    Rule {
        category: Category::FrequencyBalance,
        tier: Tier::WarningHigh,
        applies: |f| f.spectral_centroid_hz > BRIGHT_CENTROID_HZ,
        message: |f| {
            format!(
                "Bright mix (Centroid: {:.0} Hz). High frequencies are prominent. Watch for harshness or listener fatigue.",
                f.spectral_centroid_hz
            )
        },
    },
    Rule {
        category: Category::FrequencyBalance,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "Well-balanced (Centroid: {:.0} Hz). Good distribution across frequency spectrum.",
                f.spectral_centroid_hz
            )
        },
    },
    Rule {
        category: Category::HighFrequencyContent,
        tier: Tier::WarningLow,
        applies: |f| f.spectral_rolloff_percent < DULL_ROLLOFF_PERCENT,
        message: |f| {
            format!(
                "Limited high-end (Rolloff: {:.1}%). Mix may sound dull. Consider adding air or reducing low-pass filtering.",
                f.spectral_rolloff_percent
            )
        },
    },
    Rule {
        category: Category::HighFrequencyContent,
        tier: Tier::WarningHigh,
        applies: |f| f.spectral_rolloff_percent > EXTENDED_ROLLOFF_PERCENT,
        message: |f| {
            format!(
                "Extended high-end (Rolloff: {:.1}%). Very bright mix. Ensure high frequencies are musical, not harsh.",
                f.spectral_rolloff_percent
            )
        },
    },
    Rule {
        category: Category::HighFrequencyContent,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "Appropriate (Rolloff: {:.1}%). Good high-frequency extension.",
                f.spectral_rolloff_percent
            )
        },
    },
    Rule {
        category: Category::HarmonicContent,
        tier: Tier::WarningLow,
        applies: |f| f.harmonic_ratio < LOW_HARMONIC_RATIO,
        message: |f| {
            format!(
                "Low harmonic content ({:.1}%). Track is more percussive/noisy. If intended, great! If not, check for distortion or noise issues.",
                f.harmonic_ratio * 100.0
            )
        },
    },
    Rule {
        category: Category::HarmonicContent,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "Good harmonic presence ({:.1}%). Musical elements are well-represented.",
                f.harmonic_ratio * 100.0
            )
        },
    },
    Rule {
        category: Category::Tempo,
        tier: Tier::WarningLow,
        applies: |f| f.tempo_bpm < SLOW_TEMPO_BPM,
        message: |f| {
            format!(
                "Slow tempo ({:.1} BPM). Great for ambient or ballads. Ensure timing feels intentional.",
                f.tempo_bpm
            )
        },
    },
    Rule {
        category: Category::Tempo,
        tier: Tier::WarningHigh,
        applies: |f| f.tempo_bpm > FAST_TEMPO_BPM,
        message: |f| {
            format!(
                "Fast tempo ({:.1} BPM). High energy track! Ensure clarity isn't lost at this pace.",
                f.tempo_bpm
            )
        },
    },
    Rule {
        category: Category::Tempo,
        tier: Tier::Favorable,
        applies: always,
        message: |f| {
            format!(
                "{:.1} BPM detected. Tempo is well-suited for most genres.",
                f.tempo_bpm
            )
        },
    },
    Rule {
        category: Category::KeyDetection,
        tier: Tier::Info,
        applies: always,
        message: |f| {
            format!(
                "Estimated key is {}. Use this as a reference for harmonic mixing or adding complementary elements.",
                f.estimated_key
            )
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_follows_category_order() {
        let mut seen: Vec<Category> = Vec::new();
        for rule in RULES {
            if seen.last() != Some(&rule.category) {
                seen.push(rule.category);
            }
        }
        assert_eq!(seen, CATEGORY_ORDER.to_vec());
    }

    #[test]
    fn every_category_ends_with_a_fallback() {
        for category in CATEGORY_ORDER {
            let last = RULES
                .iter()
                .filter(|r| r.category == category)
                .last()
                .unwrap();
            assert!(matches!(last.tier, Tier::Favorable | Tier::Info));
        }
    }
}
