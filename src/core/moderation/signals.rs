// Signal extraction - independent heuristics over raw message content.
//
// Every check is pure. `extract_signals` runs all of them without
// short-circuiting so the reasons list reflects every trigger.

use super::filter_rules::FilterRules;
use super::moderation_models::Signal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// Weights are hundredths of a confidence point.
pub const LENGTH_WEIGHT: u32 = 30;
pub const KEYWORD_WEIGHT: u32 = 50;
pub const PATTERN_WEIGHT: u32 = 20;
pub const EXCLAMATION_WEIGHT: u32 = 20;
pub const QUESTION_WEIGHT: u32 = 20;
pub const ALL_CAPS_WEIGHT: u32 = 30;
pub const REPETITION_WEIGHT: u32 = 40;
pub const URL_WEIGHT: u32 = 30;

const MAX_EXCLAMATIONS: usize = 3;
const MAX_QUESTIONS: usize = 3;
const MIN_CAPS_LETTERS: usize = 10;
const MAX_TOKEN_REPEATS: usize = 3;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("Invalid URL regex"));

/// Run every signal against `content`, in a fixed order.
pub fn extract_signals(content: &str, rules: &FilterRules) -> Vec<Signal> {
    let mut signals = Vec::new();

    signals.extend(check_length(content, rules.config().max_message_length));
    signals.extend(check_keywords(content, rules.keywords()));
    signals.extend(check_patterns(content, rules));
    signals.extend(check_exclamations(content));
    signals.extend(check_questions(content));
    signals.extend(check_all_caps(content));
    signals.extend(check_repetition(content));
    signals.extend(check_urls(content));

    signals
}

pub fn check_length(content: &str, max_message_length: u32) -> Option<Signal> {
    (content.chars().count() > max_message_length as usize)
        .then(|| Signal::new("length", LENGTH_WEIGHT, "Message too long"))
}

/// `keywords` must already be lower-cased.
pub fn check_keywords(content: &str, keywords: &[String]) -> Option<Signal> {
    let lowered = content.to_lowercase();
    let matches: Vec<&str> = keywords
        .iter()
        .filter(|k| lowered.contains(k.as_str()))
        .map(String::as_str)
        .collect();

    if matches.is_empty() {
        return None;
    }

    Some(Signal::new(
        "keywords",
        KEYWORD_WEIGHT,
        format!("Contains blocked keywords: {}", matches.join(", ")),
    ))
}

/// One signal per matching pattern; contributions add up.
pub fn check_patterns(content: &str, rules: &FilterRules) -> Vec<Signal> {
    rules
        .patterns()
        .iter()
        .filter(|p| p.regex.is_match(content))
        .map(|p| {
            tracing::trace!(pattern = %p.source, "Suspicious pattern matched");
            Signal::new("pattern", PATTERN_WEIGHT, "Matches suspicious pattern")
        })
        .collect()
}

pub fn check_exclamations(content: &str) -> Option<Signal> {
    (content.matches('!').count() > MAX_EXCLAMATIONS).then(|| {
        Signal::new(
            "exclamations",
            EXCLAMATION_WEIGHT,
            "Excessive exclamation marks",
        )
    })
}

pub fn check_questions(content: &str) -> Option<Signal> {
    (content.matches('?').count() > MAX_QUESTIONS)
        .then(|| Signal::new("questions", QUESTION_WEIGHT, "Excessive question marks"))
}

/// Only ASCII letters are considered; everything else is stripped first.
pub fn check_all_caps(content: &str) -> Option<Signal> {
    let letters: String = content.chars().filter(char::is_ascii_alphabetic).collect();

    (letters.len() > MIN_CAPS_LETTERS && letters == letters.to_ascii_uppercase())
        .then(|| Signal::new("all_caps", ALL_CAPS_WEIGHT, "Message in all caps"))
}

/// Tokens are compared case-insensitively.
pub fn check_repetition(content: &str) -> Option<Signal> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in content.split_whitespace() {
        *counts.entry(token.to_lowercase()).or_insert(0) += 1;
    }

    counts
        .values()
        .any(|&n| n > MAX_TOKEN_REPEATS)
        .then(|| Signal::new("repetition", REPETITION_WEIGHT, "Excessive word repetition"))
}

pub fn check_urls(content: &str) -> Option<Signal> {
    URL_REGEX
        .is_match(content)
        .then(|| Signal::new("url", URL_WEIGHT, "Contains URLs"))
}
