// Compiled filter rules.
//
// A FilterConfig is validated and compiled once per configuration update.
// Keywords are lower-cased and patterns turned into regexes here so the
// per-message path never touches the raw strings again.

use super::moderation_models::FilterConfig;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_message_length must be at least 1")]
    InvalidMaxMessageLength,

    #[error("max_messages_per_minute must be at least 1")]
    InvalidMaxMessagesPerMinute,

    #[error("rate_limit_window_ms must be at least 1")]
    InvalidRateLimitWindow,
}

/// A suspicious pattern that compiled successfully.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
}

/// Validated, ready-to-evaluate form of a [`FilterConfig`].
#[derive(Debug, Clone)]
pub struct FilterRules {
    config: FilterConfig,
    keywords: Vec<String>,
    patterns: Vec<CompiledPattern>,
    rejected_patterns: Vec<String>,
}

impl FilterRules {
    /// Validate the numeric fields and compile keywords and patterns.
    ///
    /// Malformed patterns are skipped with a warning; they never fail the
    /// whole configuration.
    pub fn compile(config: FilterConfig) -> Result<Self, ConfigError> {
        validate(&config)?;

        let mut keywords: Vec<String> = config
            .blocked_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        // Two keywords differing only in case collapse into one
        keywords.sort();
        keywords.dedup();

        let mut patterns = Vec::new();
        let mut rejected_patterns = Vec::new();

        for source in &config.suspicious_patterns {
            match RegexBuilder::new(source).case_insensitive(true).build() {
                Ok(regex) => patterns.push(CompiledPattern {
                    source: source.clone(),
                    regex,
                }),
                Err(e) => {
                    tracing::warn!(pattern = %source, error = %e, "Skipping malformed suspicious pattern");
                    rejected_patterns.push(source.clone());
                }
            }
        }

        Ok(Self {
            config,
            keywords,
            patterns,
            rejected_patterns,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Lower-cased blocked keywords, sorted.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Patterns that compiled, in configuration order.
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Pattern sources that failed to compile.
    pub fn rejected_patterns(&self) -> &[String] {
        &self.rejected_patterns
    }
}

fn validate(config: &FilterConfig) -> Result<(), ConfigError> {
    if config.max_message_length == 0 {
        return Err(ConfigError::InvalidMaxMessageLength);
    }
    if config.max_messages_per_minute == 0 {
        return Err(ConfigError::InvalidMaxMessagesPerMinute);
    }
    if config.rate_limit_window_ms == 0 {
        return Err(ConfigError::InvalidRateLimitWindow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_compiles_cleanly() {
        let rules = FilterRules::compile(FilterConfig::default()).unwrap();
        assert!(rules.rejected_patterns().is_empty());
        assert_eq!(rules.patterns().len(), FilterConfig::default().suspicious_patterns.len());
    }

    #[test]
    fn test_malformed_pattern_is_skipped() {
        let config = FilterConfig {
            suspicious_patterns: vec![
                "(unclosed".to_string(),
                r"win\s+big".to_string(),
                // Backreferences are not supported by the regex engine
                r"(.)\1{5,}".to_string(),
            ],
            ..Default::default()
        };

        let rules = FilterRules::compile(config).unwrap();

        assert_eq!(rules.patterns().len(), 1);
        assert_eq!(rules.patterns()[0].source, r"win\s+big");
        assert_eq!(rules.rejected_patterns().len(), 2);
    }

    #[test]
    fn test_keywords_lowercased_and_empty_dropped() {
        let config = FilterConfig {
            blocked_keywords: ["Crypto", "crypto", "", "GIVEAWAY"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            ..Default::default()
        };

        let rules = FilterRules::compile(config).unwrap();
        assert_eq!(rules.keywords(), &["crypto".to_string(), "giveaway".to_string()]);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = FilterConfig {
            max_message_length: 0,
            ..Default::default()
        };
        assert_eq!(
            FilterRules::compile(config).unwrap_err(),
            ConfigError::InvalidMaxMessageLength
        );

        let config = FilterConfig {
            max_messages_per_minute: 0,
            ..Default::default()
        };
        assert_eq!(
            FilterRules::compile(config).unwrap_err(),
            ConfigError::InvalidMaxMessagesPerMinute
        );

        let config = FilterConfig {
            rate_limit_window_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            FilterRules::compile(config).unwrap_err(),
            ConfigError::InvalidRateLimitWindow
        );
    }
}
