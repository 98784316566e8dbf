//! Domain models shared across the triage pipeline

use serde::{Deserialize, Serialize};

/// Label IDs used by Gmail for the states the triage loop touches
pub mod labels {
    pub const INBOX: &str = "INBOX";
    pub const UNREAD: &str = "UNREAD";
    pub const SPAM: &str = "SPAM";
}

/// Reference to a message, as returned by the list call.
///
/// Short-lived: produced once per cycle and consumed by the fetch/classify/
/// relabel sequence of that same cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

impl MessageRef {
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
        }
    }
}

/// The extractable content of a fetched message.
///
/// A message with no plain-text part yields `body: None` - classification
/// then proceeds on empty text. This is a defined state, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContent {
    /// Decoded plain-text body, if the message has one
    pub body: Option<String>,
    /// Top-level MIME type of the message payload
    pub mime_type: Option<String>,
}

impl MessageContent {
    /// The text to classify - empty when no plain-text part was found
    pub fn text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Classification outcome for a single message.
///
/// Produced per message and consumed immediately to choose a label
/// mutation; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Junk - move out of the inbox into the spam label
    Spam,
    /// Legitimate mail - left in the inbox untouched
    Ham,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Ham => "ham",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ref_deserializes_camel_case() {
        let json = r#"{"id": "m1", "threadId": "t1"}"#;
        let msg_ref: MessageRef = serde_json::from_str(json).unwrap();
        assert_eq!(msg_ref.id, "m1");
        assert_eq!(msg_ref.thread_id, "t1");
    }

    #[test]
    fn test_empty_content_text() {
        let content = MessageContent::default();
        assert_eq!(content.text(), "");
    }

    #[test]
    fn test_content_text_passthrough() {
        let content = MessageContent {
            body: Some("hello".to_string()),
            mime_type: Some("text/plain".to_string()),
        };
        assert_eq!(content.text(), "hello");
    }
}
