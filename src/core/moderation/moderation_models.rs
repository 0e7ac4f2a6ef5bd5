// Moderation domain models - data structures for the spam scoring engine.
//
// These are pure domain types with no chat-platform dependencies.
// The chat layer converts these into platform-specific actions.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Default rolling window for the per-sender rate limiter.
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;

/// Keywords blocked out of the box.
pub const DEFAULT_BLOCKED_KEYWORDS: &[&str] = &[
    "spam",
    "scam",
    "free money",
    "click here",
    "buy now",
    "limited time",
];

/// Suspicious patterns enabled out of the box.
pub const DEFAULT_SUSPICIOUS_PATTERNS: &[&str] = &[
    r"free\s+(gift|followers|subs|v-?bucks)",
    r"(dm|message)\s+me\s+for\s+(promo|promotion|followers)",
    r"\$\d+[k]?\s*(per|/|a)\s*(day|hour|week)",
];

/// Filter settings supplied by the settings store.
///
/// Treated as a value object: the engine never mutates it, updates replace the
/// whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Master switch. When off every message is classified as clean.
    pub enabled: bool,
    /// Messages longer than this (in characters) trigger the length signal.
    pub max_message_length: u32,
    /// Rate limit capacity per window.
    pub max_messages_per_minute: u32,
    /// Rolling window length for the rate limiter.
    pub rate_limit_window_ms: u64,
    /// Case-insensitive substrings that mark a message as spam.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub blocked_keywords: BTreeSet<String>,
    /// Regex sources, each compiled independently.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub suspicious_patterns: Vec<String>,
    /// Consumed by the moderation-action executor, not the engine.
    pub auto_delete_spam: bool,
    /// Consumed by the moderation-action executor, not the engine.
    pub notify_on_spam: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 500,
            max_messages_per_minute: 10,
            rate_limit_window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            blocked_keywords: DEFAULT_BLOCKED_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            suspicious_patterns: DEFAULT_SUSPICIOUS_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            auto_delete_spam: false,
            notify_on_spam: true,
        }
    }
}

/// `null` and missing lists are both read as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single triggered heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Short machine name ("length", "keywords", ...)
    pub name: &'static str,
    /// Contribution in hundredths of a confidence point
    pub weight: u32,
    /// Human-readable reason
    pub reason: String,
}

impl Signal {
    pub fn new(name: &'static str, weight: u32, reason: impl Into<String>) -> Self {
        Self {
            name,
            weight,
            reason: reason.into(),
        }
    }

    /// Contribution as a confidence fraction.
    pub fn contribution(&self) -> f64 {
        f64::from(self.weight) / 100.0
    }
}

/// Verdict for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub is_spam: bool,
    /// Clamped to [0, 1]
    pub confidence: f64,
    /// One entry per triggered signal, in evaluation order
    pub reasons: Vec<String>,
}

impl ClassificationResult {
    /// Result for a message nothing fired on.
    pub fn clean() -> Self {
        Self {
            is_spam: false,
            confidence: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// What the moderation-action executor should do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamAction {
    /// Message is clean, or spam with every policy flag off
    None,
    /// Tell the moderators but leave the message up
    Notify,
    /// Remove the message silently
    Delete,
    /// Remove the message and tell the moderators
    DeleteAndNotify,
}

impl SpamAction {
    pub fn deletes(&self) -> bool {
        matches!(self, SpamAction::Delete | SpamAction::DeleteAndNotify)
    }

    pub fn notifies(&self) -> bool {
        matches!(self, SpamAction::Notify | SpamAction::DeleteAndNotify)
    }
}

impl std::fmt::Display for SpamAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpamAction::None => write!(f, "None"),
            SpamAction::Notify => write!(f, "Notify"),
            SpamAction::Delete => write!(f, "Delete"),
            SpamAction::DeleteAndNotify => write!(f, "Delete + Notify"),
        }
    }
}
