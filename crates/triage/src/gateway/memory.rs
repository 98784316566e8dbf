//! In-memory gateway implementation
//!
//! Used for testing the polling loop without the network. Mirrors Gmail's
//! label semantics: listing matches inbox messages that are unread, spam
//! verdicts move messages out of the inbox, ham verdicts change nothing.

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{MailGateway, RemoteServiceError};
use crate::models::{MessageContent, MessageRef, Verdict, labels};

struct StoredMessage {
    msg_ref: MessageRef,
    content: MessageContent,
    label_ids: Vec<String>,
}

/// In-memory implementation of [`MailGateway`]
///
/// Preserves insertion order in listings and records every fetch and
/// verdict application so tests can assert on call sequences. Individual
/// messages and the listing itself can be made to fail on demand.
#[derive(Default)]
pub struct InMemoryGateway {
    messages: RwLock<Vec<StoredMessage>>,
    fetched: RwLock<Vec<String>>,
    applied: RwLock<Vec<(String, Verdict)>>,
    failing_fetches: RwLock<HashSet<String>>,
    failing_list: AtomicBool,
}

impl InMemoryGateway {
    /// Create a new empty in-memory gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unread inbox message with the given plain-text body
    pub fn add_unread(&self, id: &str, thread_id: &str, body: Option<&str>) {
        let mut messages = self.messages.write().unwrap();
        messages.push(StoredMessage {
            msg_ref: MessageRef::new(id, thread_id),
            content: MessageContent {
                body: body.map(|b| b.to_string()),
                mime_type: Some("text/plain".to_string()),
            },
            label_ids: vec![labels::INBOX.to_string(), labels::UNREAD.to_string()],
        });
    }

    /// Make fetches of the given message fail with a transport error
    pub fn fail_fetch(&self, id: &str) {
        self.failing_fetches.write().unwrap().insert(id.to_string());
    }

    /// Make the next listing calls fail with a transport error
    pub fn fail_listing(&self, failing: bool) {
        self.failing_list.store(failing, Ordering::Relaxed);
    }

    /// Current labels of a message
    pub fn labels_of(&self, id: &str) -> Option<Vec<String>> {
        let messages = self.messages.read().unwrap();
        messages
            .iter()
            .find(|m| m.msg_ref.id == id)
            .map(|m| m.label_ids.clone())
    }

    /// IDs fetched so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.read().unwrap().clone()
    }

    /// Verdict applications so far, in call order
    pub fn applied(&self) -> Vec<(String, Verdict)> {
        self.applied.read().unwrap().clone()
    }
}

impl MailGateway for InMemoryGateway {
    fn list_unread(&self) -> Result<Vec<MessageRef>, RemoteServiceError> {
        if self.failing_list.load(Ordering::Relaxed) {
            return Err(RemoteServiceError::Transport(
                "listing unavailable".to_string(),
            ));
        }

        let messages = self.messages.read().unwrap();
        Ok(messages
            .iter()
            .filter(|m| {
                m.label_ids.iter().any(|l| l == labels::INBOX)
                    && m.label_ids.iter().any(|l| l == labels::UNREAD)
            })
            .map(|m| m.msg_ref.clone())
            .collect())
    }

    fn fetch_content(&self, msg_ref: &MessageRef) -> Result<MessageContent, RemoteServiceError> {
        if self.failing_fetches.read().unwrap().contains(&msg_ref.id) {
            return Err(RemoteServiceError::Transport(format!(
                "fetch of {} unavailable",
                msg_ref.id
            )));
        }

        self.fetched.write().unwrap().push(msg_ref.id.clone());

        let messages = self.messages.read().unwrap();
        messages
            .iter()
            .find(|m| m.msg_ref.id == msg_ref.id)
            .map(|m| m.content.clone())
            .ok_or(RemoteServiceError::Api { status: 404 })
    }

    fn apply_verdict(
        &self,
        msg_ref: &MessageRef,
        verdict: Verdict,
    ) -> Result<(), RemoteServiceError> {
        self.applied
            .write()
            .unwrap()
            .push((msg_ref.id.clone(), verdict));

        let mut messages = self.messages.write().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.msg_ref.id == msg_ref.id)
            .ok_or(RemoteServiceError::Api { status: 404 })?;

        if verdict == Verdict::Spam {
            message.label_ids.retain(|l| l != labels::INBOX);
            if !message.label_ids.iter().any(|l| l == labels::SPAM) {
                message.label_ids.push(labels::SPAM.to_string());
            }
        }
        // Ham leaves the message in the inbox untouched

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_unread_returns_inbox_unread_only() {
        let gateway = InMemoryGateway::new();
        gateway.add_unread("m1", "t1", Some("hello"));
        gateway.add_unread("m2", "t2", Some("world"));

        let refs = gateway.list_unread().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "m1");
        assert_eq!(refs[1].id, "m2");
    }

    #[test]
    fn test_spam_verdict_moves_out_of_inbox() {
        let gateway = InMemoryGateway::new();
        gateway.add_unread("m1", "t1", Some("buy now"));
        let msg_ref = MessageRef::new("m1", "t1");

        gateway.apply_verdict(&msg_ref, Verdict::Spam).unwrap();

        let label_ids = gateway.labels_of("m1").unwrap();
        assert!(label_ids.contains(&labels::SPAM.to_string()));
        assert!(!label_ids.contains(&labels::INBOX.to_string()));
        // No longer listed as unread inbox mail
        assert!(gateway.list_unread().unwrap().is_empty());
    }

    #[test]
    fn test_apply_verdict_is_idempotent() {
        let gateway = InMemoryGateway::new();
        gateway.add_unread("m1", "t1", Some("buy now"));
        let msg_ref = MessageRef::new("m1", "t1");

        gateway.apply_verdict(&msg_ref, Verdict::Spam).unwrap();
        let once = gateway.labels_of("m1").unwrap();

        gateway.apply_verdict(&msg_ref, Verdict::Spam).unwrap();
        let twice = gateway.labels_of("m1").unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_ham_verdict_changes_nothing() {
        let gateway = InMemoryGateway::new();
        gateway.add_unread("m1", "t1", Some("see you tomorrow"));
        let before = gateway.labels_of("m1").unwrap();

        gateway
            .apply_verdict(&MessageRef::new("m1", "t1"), Verdict::Ham)
            .unwrap();

        assert_eq!(gateway.labels_of("m1").unwrap(), before);
    }

    #[test]
    fn test_failing_fetch() {
        let gateway = InMemoryGateway::new();
        gateway.add_unread("m1", "t1", Some("hello"));
        gateway.fail_fetch("m1");

        let err = gateway
            .fetch_content(&MessageRef::new("m1", "t1"))
            .unwrap_err();
        assert!(err.is_transient());
    }
}
