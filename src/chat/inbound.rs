// Inbound chat messages, one per line: `<sender_id>\t<content>`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub content: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing tab between sender id and content")]
    MissingSeparator,

    #[error("empty sender id")]
    EmptySender,
}

/// Parse one line, stamping it with `timestamp_ms`.
///
/// Content is kept verbatim, including any further tabs.
pub fn parse_line(line: &str, timestamp_ms: i64) -> Result<InboundMessage, ParseError> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let (sender, content) = line.split_once('\t').ok_or(ParseError::MissingSeparator)?;

    let sender = sender.trim();
    if sender.is_empty() {
        return Err(ParseError::EmptySender);
    }

    Ok(InboundMessage {
        sender_id: sender.to_string(),
        content: content.to_string(),
        timestamp_ms,
    })
}
