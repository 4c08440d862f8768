//! Deterministic mixing feedback derived from a [`DescriptorSet`](crate::DescriptorSet).
//!
//! Each category contributes exactly one entry chosen from a static rule table,
//! and an overall banner summarising how many categories landed in range is
//! placed first.

mod engine;
pub mod rules;

use std::fmt;

use serde::{Serialize, Serializer};

pub use engine::{generate, generate_from_json, EXTRACTION_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Overall,
    Loudness,
    DynamicRange,
    FrequencyBalance,
    HighFrequencyContent,
    HarmonicContent,
    Tempo,
    KeyDetection,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Overall => "Overall",
            Category::Loudness => "Loudness",
            Category::DynamicRange => "Dynamic Range",
            Category::FrequencyBalance => "Frequency Balance",
            Category::HighFrequencyContent => "High-Frequency Content",
            Category::HarmonicContent => "Harmonic Content",
            Category::Tempo => "Tempo",
            Category::KeyDetection => "Key Detection",
        }
    }

    /// Marker shown in front of non-favorable entries.
    pub fn icon(self) -> &'static str {
        match self {
            Category::Overall => "💡",
            Category::Loudness => "🔊",
            Category::DynamicRange => "🎚️",
            Category::FrequencyBalance => "🎵",
            Category::HighFrequencyContent => "📊",
            Category::HarmonicContent => "🎸",
            Category::Tempo => "⏱️",
            Category::KeyDetection => "🎹",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Favorable,
    WarningLow,
    WarningHigh,
    Info,
}

impl Tier {
    pub const FAVORABLE_MARKER: &'static str = "✅";

    pub fn marker(self, category: Category) -> &'static str {
        match self {
            Tier::Favorable => Self::FAVORABLE_MARKER,
            _ => category.icon(),
        }
    }
}

/// One rendered piece of feedback. Serialises as its display text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    category: Category,
    tier: Tier,
    text: String,
}

impl Suggestion {
    /// Renders `<marker> **<Category>**: <message>`.
    pub fn new(category: Category, tier: Tier, message: &str) -> Self {
        Self::with_marker(category, tier, tier.marker(category), message)
    }

    pub fn with_marker(category: Category, tier: Tier, marker: &str, message: &str) -> Self {
        Self {
            category,
            tier,
            text: format!("{} **{}**: {}", marker, category, message),
        }
    }

    /// An entry whose text is used verbatim.
    pub fn plain(category: Category, tier: Tier, text: impl Into<String>) -> Self {
        Self {
            category,
            tier,
            text: text.into(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_favorable(&self) -> bool {
        self.tier == Tier::Favorable
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Suggestion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
