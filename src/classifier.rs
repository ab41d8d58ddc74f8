//! Environment classification based on keyword presence

use std::fmt;

use crate::error::Result;
use crate::validation;

/// Fixed environmental vocabulary, in reporting order
pub const ENVIRONMENT_KEYWORDS: [&str; 12] = [
    "climate",
    "pollution",
    "earth",
    "global warming",
    "deforestation",
    "recycle",
    "environment",
    "sustainability",
    "carbon",
    "emissions",
    "renewable",
    "biodiversity",
];

/// Number of distinct keyword matches that saturates confidence at 1.0
const SATURATION: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentLabel {
    EnvironmentRelated,
    NotEnvironmentRelated,
}

impl EnvironmentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentLabel::EnvironmentRelated => "Environment-related",
            EnvironmentLabel::NotEnvironmentRelated => "Not Environment-related",
        }
    }
}

impl fmt::Display for EnvironmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: EnvironmentLabel,
    /// Reported confidence in [0, 1]
    pub confidence: f32,
    /// Matched keywords in table order; empty for the negative label
    pub matched_keywords: Vec<&'static str>,
}

impl ClassificationResult {
    pub fn match_count(&self) -> usize {
        self.matched_keywords.len()
    }

    /// Human-readable block shown in the results pane.
    pub fn render(&self) -> String {
        match self.label {
            EnvironmentLabel::EnvironmentRelated => format!(
                "Classification: {}\nConfidence: {:.2}\nKeywords found: {}\n\nEnvironmental keywords detected: {}",
                self.label,
                self.confidence,
                self.match_count(),
                self.matched_keywords.join(", ")
            ),
            EnvironmentLabel::NotEnvironmentRelated => format!(
                "Classification: {}\nConfidence: {:.2}\n\nNo environmental keywords detected.",
                self.label, self.confidence
            ),
        }
    }
}

/// Keywords from the fixed table contained in `text`, case-insensitively.
/// A keyword occurring several times is reported once.
pub fn matched_keywords(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    ENVIRONMENT_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| lower.contains(kw))
        .collect()
}

/// Classify `text` as environment-related or not.
///
/// Blank input is rejected with a validation error and nothing is computed.
pub fn classify(text: &str) -> Result<ClassificationResult> {
    let text = validation::require_text(text, validation::ANALYZE_TEXT_WARNING)?;

    let matched = matched_keywords(text);
    let confidence = (matched.len() as f32 / SATURATION).min(1.0);

    // Negative case reports 1 - confidence, which is always 1.0 with no matches.
    let result = if matched.is_empty() {
        ClassificationResult {
            label: EnvironmentLabel::NotEnvironmentRelated,
            confidence: 1.0 - confidence,
            matched_keywords: matched,
        }
    } else {
        ClassificationResult {
            label: EnvironmentLabel::EnvironmentRelated,
            confidence,
            matched_keywords: matched,
        }
    };

    tracing::debug!(
        label = %result.label,
        matches = result.match_count(),
        "classified text"
    );
    Ok(result)
}
