// Chat-side spam handling - runs inbound messages through the engine and
// translates the planned action into executor calls.

use crate::chat::inbound::InboundMessage;
use crate::core::moderation::{
    ClassificationResult, ModerationEngine, ModerationExecutor, SpamAction,
};
use serde::Serialize;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModerationOutcome {
    /// Sender was over the rate limit; the message was not scored
    RateLimited { sender_id: String },
    Classified {
        sender_id: String,
        #[serde(flatten)]
        result: ClassificationResult,
        action: SpamAction,
    },
}

/// Rate-limit, score and act on one message.
///
/// Executor failures are logged, not returned: a failed delete must not stop
/// the pipeline from handling the next message.
pub async fn handle_message_for_spam<E: ModerationExecutor + ?Sized>(
    engine: &ModerationEngine,
    executor: &E,
    msg: &InboundMessage,
) -> ModerationOutcome {
    if engine.admit_message(&msg.sender_id, msg.timestamp_ms) {
        return ModerationOutcome::RateLimited {
            sender_id: msg.sender_id.clone(),
        };
    }

    let (result, action) = engine.evaluate_and_plan(&msg.content, &msg.sender_id, msg.timestamp_ms);

    apply_spam_action(executor, msg, &result, action).await;

    ModerationOutcome::Classified {
        sender_id: msg.sender_id.clone(),
        result,
        action,
    }
}

/// Apply the appropriate action for detected spam.
async fn apply_spam_action<E: ModerationExecutor + ?Sized>(
    executor: &E,
    msg: &InboundMessage,
    result: &ClassificationResult,
    action: SpamAction,
) {
    if action.deletes() {
        if let Err(e) = executor.delete_message(&msg.sender_id, &msg.content).await {
            tracing::warn!("Failed to delete spam message: {}", e);
        }
    }

    if action.notifies() {
        if let Err(e) = executor.notify_moderators(&msg.sender_id, result).await {
            tracing::warn!("Failed to notify moderators: {}", e);
        }
    }
}
