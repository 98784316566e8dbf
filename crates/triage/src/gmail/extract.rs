//! Plain-text body extraction from Gmail message payloads
//!
//! Pure functions, no I/O. A message may be single-part (body directly on
//! the payload) or multipart with arbitrarily nested parts; the first
//! `text/plain` part wins. Messages without one (e.g. HTML-only) yield
//! empty content, which downstream classification treats as empty text.

use base64::prelude::*;

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::MessageContent;

/// Extract the classifiable content of a fetched message
pub fn extract_content(message: &GmailMessage) -> MessageContent {
    let Some(payload) = &message.payload else {
        return MessageContent::default();
    };

    MessageContent {
        body: extract_plain_text(payload),
        mime_type: payload.mime_type.clone(),
    }
}

/// Extract the plain-text body from a message payload
fn extract_plain_text(payload: &MessagePayload) -> Option<String> {
    // Single-part message with the body directly on the payload
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
    {
        return decode_base64_body(data);
    }

    // Multipart: first text/plain part anywhere in the tree
    if let Some(parts) = &payload.parts
        && let Some(text) = find_plain_text_in_parts(parts)
    {
        return Some(text);
    }

    None
}

/// Recursively search message parts for text/plain content
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple
/// decoders.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    for decoder in decoders {
        if let Ok(decoded) = decoder.decode(data)
            && let Ok(s) = String::from_utf8(decoded)
        {
            return Some(s);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::MessageBody;

    fn encode(text: &str) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(text)
    }

    fn part(mime: &str, text: Option<&str>, parts: Option<Vec<MessagePart>>) -> MessagePart {
        MessagePart {
            part_id: None,
            mime_type: Some(mime.to_string()),
            filename: None,
            body: text.map(|t| MessageBody {
                size: Some(t.len() as u32),
                data: Some(encode(t)),
            }),
            parts,
        }
    }

    fn message(payload: Option<MessagePayload>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            label_ids: Some(vec!["INBOX".to_string(), "UNREAD".to_string()]),
            payload,
        }
    }

    #[test]
    fn test_single_part_plain_text() {
        let msg = message(Some(MessagePayload {
            headers: None,
            body: Some(MessageBody {
                size: Some(5),
                data: Some(encode("hello")),
            }),
            parts: None,
            mime_type: Some("text/plain".to_string()),
        }));

        let content = extract_content(&msg);
        assert_eq!(content.body.as_deref(), Some("hello"));
        assert_eq!(content.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_multipart_picks_first_plain_text() {
        let msg = message(Some(MessagePayload {
            headers: None,
            body: None,
            parts: Some(vec![
                part("text/html", Some("<b>hi</b>"), None),
                part("text/plain", Some("first"), None),
                part("text/plain", Some("second"), None),
            ]),
            mime_type: Some("multipart/alternative".to_string()),
        }));

        assert_eq!(extract_content(&msg).body.as_deref(), Some("first"));
    }

    #[test]
    fn test_nested_multipart() {
        let inner = vec![
            part("text/html", Some("<b>hi</b>"), None),
            part("text/plain", Some("nested text"), None),
        ];
        let msg = message(Some(MessagePayload {
            headers: None,
            body: None,
            parts: Some(vec![
                part("application/pdf", None, None),
                part("multipart/alternative", None, Some(inner)),
            ]),
            mime_type: Some("multipart/mixed".to_string()),
        }));

        assert_eq!(extract_content(&msg).body.as_deref(), Some("nested text"));
    }

    #[test]
    fn test_html_only_message_yields_empty_content() {
        let msg = message(Some(MessagePayload {
            headers: None,
            body: None,
            parts: Some(vec![part("text/html", Some("<p>only html</p>"), None)]),
            mime_type: Some("multipart/alternative".to_string()),
        }));

        let content = extract_content(&msg);
        assert_eq!(content.body, None);
        assert_eq!(content.text(), "");
    }

    #[test]
    fn test_missing_payload_yields_empty_content() {
        let content = extract_content(&message(None));
        assert_eq!(content.body, None);
        assert_eq!(content.mime_type, None);
    }

    #[test]
    fn test_decode_base64_body_padding_variants() {
        // "Hello, World!" in unpadded base64url
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ"),
            Some("Hello, World!".to_string())
        );
        // Same with standard padding
        assert_eq!(
            decode_base64_body("SGVsbG8sIFdvcmxkIQ=="),
            Some("Hello, World!".to_string())
        );
    }

    #[test]
    fn test_decode_base64_body_garbage() {
        assert_eq!(decode_base64_body("!!not base64!!"), None);
    }
}
