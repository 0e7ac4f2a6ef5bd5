// Moderation engine - the facade the chat layer talks to.
//
// This service handles:
// - Spam scoring (signals -> confidence -> verdict)
// - Per-sender rate limiting
// - Atomic configuration swaps
// - Turning a verdict into a SpamAction for the executor
//
// NO chat-platform dependencies here - just pure domain logic.

use super::filter_rules::{ConfigError, FilterRules};
use super::moderation_models::{ClassificationResult, FilterConfig, SpamAction};
use super::rate_limiter::{exceeds_rate_limit, RateLimiter};
use super::scoring::{score_message, SPAM_THRESHOLD};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[allow(dead_code)]
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to delete message from {sender_id}: {reason}")]
    DeleteFailed { sender_id: String, reason: String },

    #[error("Failed to notify moderators: {0}")]
    NotifyFailed(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Where filter settings live between restarts.
#[async_trait]
pub trait FilterSettingsStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<FilterConfig>, StoreError>;

    async fn save(&self, config: &FilterConfig) -> Result<(), StoreError>;
}

/// Performs the side effects of a verdict. The engine never calls this itself;
/// the chat layer does, based on the planned [`SpamAction`].
#[async_trait]
pub trait ModerationExecutor: Send + Sync {
    async fn delete_message(&self, sender_id: &str, content: &str) -> Result<(), ExecutorError>;

    async fn notify_moderators(
        &self,
        sender_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), ExecutorError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Spam scoring and rate limiting behind one handle.
///
/// Safe to share across tasks (`Arc<ModerationEngine>`). Scoring reads a
/// snapshot of the active rules taken at call start, so a concurrent
/// [`update_configuration`](Self::update_configuration) is seen either fully
/// or not at all.
pub struct ModerationEngine {
    rules: RwLock<Arc<FilterRules>>,
    limiter: RateLimiter,
}

impl ModerationEngine {
    pub fn new(config: FilterConfig) -> Result<Self, ConfigError> {
        let rules = FilterRules::compile(config)?;
        Ok(Self {
            rules: RwLock::new(Arc::new(rules)),
            limiter: RateLimiter::new(),
        })
    }

    /// Current rules. Cheap: clones an `Arc`.
    fn snapshot(&self) -> Arc<FilterRules> {
        let guard = self
            .rules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Score a message.
    ///
    /// `sender_id` and `timestamp_ms` only feed the trace; scoring itself looks
    /// at content alone.
    #[allow(dead_code)]
    pub fn evaluate_message(
        &self,
        content: &str,
        sender_id: &str,
        timestamp_ms: i64,
    ) -> ClassificationResult {
        evaluate_with(&self.snapshot(), content, sender_id, timestamp_ms)
    }

    /// Score a message and plan the follow-up from the same config snapshot.
    pub fn evaluate_and_plan(
        &self,
        content: &str,
        sender_id: &str,
        timestamp_ms: i64,
    ) -> (ClassificationResult, SpamAction) {
        let rules = self.snapshot();
        let result = evaluate_with(&rules, content, sender_id, timestamp_ms);
        let action = plan_action(&result, rules.config());
        (result, action)
    }

    /// Rate-limit check over a history the caller keeps.
    #[allow(dead_code)]
    pub fn should_rate_limit(
        &self,
        sender_id: &str,
        recent_timestamps: &[i64],
        now_ms: i64,
        window_ms: u64,
    ) -> bool {
        let max = self.snapshot().config().max_messages_per_minute;
        let limited = exceeds_rate_limit(recent_timestamps, now_ms, window_ms, max);
        if limited {
            tracing::debug!(sender_id, window_ms, max, "Sender over rate limit");
        }
        limited
    }

    /// Rate-limit check over the engine's own per-sender window.
    #[allow(dead_code)]
    pub fn should_rate_limit_sender(&self, sender_id: &str, now_ms: i64) -> bool {
        let rules = self.snapshot();
        let config = rules.config();
        self.limiter.should_rate_limit(
            sender_id,
            now_ms,
            config.rate_limit_window_ms,
            config.max_messages_per_minute,
        )
    }

    /// Record a message the caller decided to let through.
    #[allow(dead_code)]
    pub fn record_message(&self, sender_id: &str, timestamp_ms: i64) {
        self.limiter.record_message(sender_id, timestamp_ms);
    }

    /// Check the sender's window and record the message if it fits.
    ///
    /// Returns `true` when the message is throttled.
    pub fn admit_message(&self, sender_id: &str, now_ms: i64) -> bool {
        let rules = self.snapshot();
        let config = rules.config();
        let limited = self.limiter.check_and_record(
            sender_id,
            now_ms,
            config.rate_limit_window_ms,
            config.max_messages_per_minute,
        );
        if limited {
            tracing::info!(sender_id, now_ms, "Message throttled");
        }
        limited
    }

    /// Replace the active configuration.
    ///
    /// The new config is compiled before the swap; if it is invalid the old one
    /// stays in effect.
    pub fn update_configuration(&self, config: FilterConfig) -> Result<(), ConfigError> {
        let rules = match FilterRules::compile(config) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!("Rejected filter configuration update: {}", e);
                return Err(e);
            }
        };

        tracing::info!(
            enabled = rules.config().enabled,
            keywords = rules.keywords().len(),
            patterns = rules.patterns().len(),
            skipped_patterns = rules.rejected_patterns().len(),
            "Filter configuration updated"
        );

        let mut guard = self
            .rules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(rules);
        Ok(())
    }

    /// Copy of the active configuration.
    pub fn configuration(&self) -> FilterConfig {
        self.snapshot().config().clone()
    }

    #[allow(dead_code)]
    pub fn clear_sender(&self, sender_id: &str) -> bool {
        self.limiter.clear_sender(sender_id)
    }

    /// Drop rate-limit state for senders idle for a full window.
    pub fn sweep_idle(&self, now_ms: i64) -> usize {
        let window = self.snapshot().config().rate_limit_window_ms;
        self.limiter.sweep_idle(now_ms, window)
    }
}

fn evaluate_with(
    rules: &FilterRules,
    content: &str,
    sender_id: &str,
    timestamp_ms: i64,
) -> ClassificationResult {
    let result = score_message(content, rules);

    if result.is_spam {
        tracing::debug!(
            sender_id,
            timestamp_ms,
            confidence = result.confidence,
            threshold = SPAM_THRESHOLD,
            reasons = ?result.reasons,
            "Message classified as spam"
        );
    }

    result
}

/// Decide what the executor should do with a classified message.
pub fn plan_action(result: &ClassificationResult, config: &FilterConfig) -> SpamAction {
    if !result.is_spam {
        return SpamAction::None;
    }

    match (config.auto_delete_spam, config.notify_on_spam) {
        (true, true) => SpamAction::DeleteAndNotify,
        (true, false) => SpamAction::Delete,
        (false, true) => SpamAction::Notify,
        (false, false) => SpamAction::None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn engine() -> ModerationEngine {
        ModerationEngine::new(FilterConfig::default()).unwrap()
    }

    /// 600+ characters with no repeated words, keywords, or shouting.
    fn long_clean_message() -> String {
        (0..125)
            .map(|i| format!("w{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_promo_message_is_spam() {
        let result = engine().evaluate_message("BUY NOW!!! limited time offer http://x.co", "u1", 0);

        assert!(result.is_spam);
        assert!(result.confidence >= 0.5);
        assert_eq!(
            result.reasons,
            vec![
                "Contains blocked keywords: buy now, limited time".to_string(),
                "Contains URLs".to_string(),
            ]
        );
    }

    #[test]
    fn test_friendly_message_is_clean() {
        let result = engine().evaluate_message("hello, how are you today?", "u1", 0);

        assert!(!result.is_spam);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_long_clean_message_only_trips_length() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                max_message_length: 500,
                ..Default::default()
            })
            .unwrap();

        let message = long_clean_message();
        assert!(message.chars().count() >= 600);

        let result = engine.evaluate_message(&message, "u1", 0);

        assert!(!result.is_spam);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.reasons, vec!["Message too long".to_string()]);
    }

    #[test]
    fn test_disabled_filter() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                enabled: false,
                ..Default::default()
            })
            .unwrap();

        for message in ["BUY NOW!!!! http://x.co", "SCAM SCAM SCAM SCAM", ""] {
            let result = engine.evaluate_message(message, "u1", 0);
            assert_eq!(result, ClassificationResult::clean());
        }
    }

    #[test]
    fn test_adding_matching_keyword_never_lowers_confidence() {
        let message = "grab your crypto giveaway now";
        let engine = engine();
        let before = engine.evaluate_message(message, "u1", 0);

        let mut config = FilterConfig::default();
        config.blocked_keywords.insert("giveaway".to_string());
        engine.update_configuration(config).unwrap();
        let after = engine.evaluate_message(message, "u1", 0);

        assert!(after.confidence >= before.confidence);
        assert!(after.is_spam);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let engine = engine();
        let message = "FREE GIFT for everyone!!!! dm me for promo http://x.co";

        let first = engine.evaluate_message(message, "u1", 42);
        let second = engine.evaluate_message(message, "u1", 42);

        assert_eq!(first, second);
    }

    #[test]
    fn test_three_patterns_alone_cross_threshold() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                blocked_keywords: Default::default(),
                suspicious_patterns: vec!["alpha".into(), "beta".into(), "gamma".into()],
                ..Default::default()
            })
            .unwrap();

        let result = engine.evaluate_message("alpha beta gamma", "u1", 0);

        assert_eq!(result.reasons.len(), 3);
        assert!((result.confidence - 0.6).abs() < 1e-9);
        assert!(result.is_spam);
    }

    #[test]
    fn test_invalid_update_keeps_previous_config() {
        let engine = engine();
        let original = engine.configuration();

        let err = engine
            .update_configuration(FilterConfig {
                max_messages_per_minute: 0,
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err, ConfigError::InvalidMaxMessagesPerMinute);
        assert_eq!(engine.configuration(), original);
    }

    #[test]
    fn test_history_rate_limit_uses_active_capacity() {
        let engine = engine();
        let t = 1_000_000;
        let history = [t - 70_000, t - 5_000, t - 1_000];

        engine
            .update_configuration(FilterConfig {
                max_messages_per_minute: 2,
                ..Default::default()
            })
            .unwrap();
        assert!(engine.should_rate_limit("u1", &history, t, 60_000));

        engine
            .update_configuration(FilterConfig {
                max_messages_per_minute: 3,
                ..Default::default()
            })
            .unwrap();
        assert!(!engine.should_rate_limit("u1", &history, t, 60_000));
    }

    #[test]
    fn test_admit_message_throttles_after_capacity() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                max_messages_per_minute: 3,
                rate_limit_window_ms: 1_000,
                ..Default::default()
            })
            .unwrap();

        assert!(!engine.admit_message("u1", 0));
        assert!(!engine.admit_message("u1", 10));
        assert!(!engine.admit_message("u1", 20));
        assert!(engine.admit_message("u1", 30));
        assert!(engine.should_rate_limit_sender("u1", 30));

        // Window of 1s has passed for all three
        assert!(!engine.admit_message("u1", 1_021));
        assert_eq!(engine.sweep_idle(5_000), 1);
    }

    #[test]
    fn test_record_then_clear_sender() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                max_messages_per_minute: 1,
                ..Default::default()
            })
            .unwrap();

        engine.record_message("u1", 100);
        assert!(engine.should_rate_limit_sender("u1", 200));
        assert!(engine.clear_sender("u1"));
        assert!(!engine.should_rate_limit_sender("u1", 200));
    }

    #[test]
    fn test_concurrent_readers_see_whole_configs() {
        let engine = Arc::new(engine());
        let strict = FilterConfig {
            max_message_length: 1,
            max_messages_per_minute: 1,
            ..Default::default()
        };
        let lenient = FilterConfig {
            max_message_length: 10_000,
            max_messages_per_minute: 10_000,
            ..Default::default()
        };

        let writer = {
            let engine = Arc::clone(&engine);
            let (strict, lenient) = (strict.clone(), lenient.clone());
            thread::spawn(move || {
                for i in 0..200 {
                    let next = if i % 2 == 0 { strict.clone() } else { lenient.clone() };
                    engine.update_configuration(next).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let seen = engine.configuration();
            // Both fields always come from the same config
            assert_eq!(
                seen.max_message_length == 1,
                seen.max_messages_per_minute == 1
            );
        }

        writer.join().unwrap();
    }

    #[test]
    fn test_evaluate_and_plan_uses_policy_flags() {
        let engine = engine();
        engine
            .update_configuration(FilterConfig {
                auto_delete_spam: true,
                notify_on_spam: false,
                ..Default::default()
            })
            .unwrap();

        let (result, action) = engine.evaluate_and_plan("click here http://x.co", "u1", 0);
        assert!(result.is_spam);
        assert_eq!(action, SpamAction::Delete);

        let (result, action) = engine.evaluate_and_plan("good game everyone", "u1", 0);
        assert!(!result.is_spam);
        assert_eq!(action, SpamAction::None);
    }

    #[test]
    fn test_evaluate_and_plan_scores_like_evaluate_message() {
        let engine = engine();
        for message in [
            "BUY NOW!!! limited time offer http://x.co",
            "hello, how are you today?",
            "FREE GIFT for everyone!!!! dm me for promo",
        ] {
            let (planned, _) = engine.evaluate_and_plan(message, "u1", 7);
            assert_eq!(planned, engine.evaluate_message(message, "u1", 7));
        }
    }

    #[test]
    fn test_plan_action_table() {
        let spam = ClassificationResult {
            is_spam: true,
            confidence: 0.8,
            reasons: vec!["Contains URLs".into()],
        };
        let clean = ClassificationResult::clean();

        let config = |auto_delete_spam, notify_on_spam| FilterConfig {
            auto_delete_spam,
            notify_on_spam,
            ..Default::default()
        };

        assert_eq!(plan_action(&clean, &config(true, true)), SpamAction::None);
        assert_eq!(plan_action(&spam, &config(true, true)), SpamAction::DeleteAndNotify);
        assert_eq!(plan_action(&spam, &config(true, false)), SpamAction::Delete);
        assert_eq!(plan_action(&spam, &config(false, true)), SpamAction::Notify);
        assert_eq!(plan_action(&spam, &config(false, false)), SpamAction::None);
    }
}
