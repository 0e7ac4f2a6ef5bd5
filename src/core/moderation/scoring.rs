// Score aggregation and classification.

use super::filter_rules::FilterRules;
use super::moderation_models::{ClassificationResult, Signal};
use super::signals::extract_signals;

/// Confidence at or above which a message is spam.
pub const SPAM_THRESHOLD: f64 = 0.5;

/// Weights are summed as integers and clamped here, so 100 == full confidence.
const MAX_WEIGHT: u32 = 100;
const THRESHOLD_WEIGHT: u32 = 50;

/// Aggregated confidence plus the reasons that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Clamped total, in hundredths
    pub weight: u32,
    pub reasons: Vec<String>,
}

impl Score {
    pub fn confidence(&self) -> f64 {
        f64::from(self.weight) / 100.0
    }
}

/// Sum every contribution and clamp the total to [0, 1].
pub fn aggregate(signals: &[Signal]) -> Score {
    let total = signals
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.weight));

    Score {
        weight: total.min(MAX_WEIGHT),
        reasons: signals.iter().map(|s| s.reason.clone()).collect(),
    }
}

/// Boundary value counts as spam.
pub fn classify(score: &Score) -> bool {
    score.weight >= THRESHOLD_WEIGHT
}

/// Full scoring pipeline for one message.
///
/// A disabled filter returns a clean result without running any signal.
pub fn score_message(content: &str, rules: &FilterRules) -> ClassificationResult {
    if !rules.config().enabled {
        return ClassificationResult::clean();
    }

    let signals = extract_signals(content, rules);
    for signal in &signals {
        tracing::trace!(
            signal = signal.name,
            contribution = signal.contribution(),
            "Signal fired"
        );
    }
    let score = aggregate(&signals);

    ClassificationResult {
        is_spam: classify(&score),
        confidence: score.confidence(),
        reasons: score.reasons,
    }
}
