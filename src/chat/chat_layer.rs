// Chat layer - turns raw inbound chat lines into engine calls and applies
// the resulting moderation actions.

#[path = "inbound.rs"]
pub mod inbound;

#[path = "moderation/spam_handler.rs"]
pub mod spam_handler;

pub use inbound::parse_line;
pub use spam_handler::handle_message_for_spam;
