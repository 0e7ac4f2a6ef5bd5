// Moderation-action executor that only reports.
//
// There is no chat platform behind this binary, so "deleting" a message means
// emitting a structured event for whatever consumes the logs.

use crate::core::moderation::{ClassificationResult, ExecutorError, ModerationExecutor};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest content excerpt written to the log.
const EXCERPT_CHARS: usize = 80;

#[derive(Default)]
pub struct TracingExecutor {
    deleted: AtomicU64,
    notified: AtomicU64,
}

impl TracingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    pub fn notified_count(&self) -> u64 {
        self.notified.load(Ordering::Relaxed)
    }
}

fn excerpt(content: &str) -> String {
    let mut out: String = content.chars().take(EXCERPT_CHARS).collect();
    if content.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

#[async_trait]
impl ModerationExecutor for TracingExecutor {
    async fn delete_message(&self, sender_id: &str, content: &str) -> Result<(), ExecutorError> {
        self.deleted.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(sender_id, content = %excerpt(content), "Deleted spam message");
        Ok(())
    }

    async fn notify_moderators(
        &self,
        sender_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), ExecutorError> {
        self.notified.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            sender_id,
            confidence = result.confidence,
            reasons = %result.reasons.join("; "),
            "Spam reported to moderators"
        );
        Ok(())
    }
}
