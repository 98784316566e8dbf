//! Gmail API HTTP client
//!
//! Implements [`MailGateway`] over the Gmail REST API. Uses synchronous
//! HTTP (ureq) to be executor-agnostic; every request goes through a shared
//! agent with global timeouts so a polling cycle's worst case is bounded.

use log::debug;
use std::time::Duration;

use super::GmailAuth;
use super::api::{GmailMessage, ListMessagesResponse, ModifyMessageRequest};
use super::extract::extract_content;
use crate::gateway::{MailGateway, RemoteServiceError};
use crate::models::{MessageContent, MessageRef, Verdict, labels};

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Messages per list request (Gmail caps a page at 500)
    const LIST_MAX_RESULTS: usize = 500;

    /// Upper bound on any single remote call
    const CALL_TIMEOUT: Duration = Duration::from_secs(30);

    /// Attempts per message fetch before giving up on it for this cycle
    const FETCH_RETRIES: u32 = 3;

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::CALL_TIMEOUT))
            .build()
            .into();
        Self { auth, agent }
    }

    /// List unread inbox messages.
    ///
    /// A single page suffices: anything beyond the page cap is picked up by
    /// the next cycle, since processed spam leaves the inbox and the rest
    /// stays unread.
    pub fn list_unread_messages(&self) -> Result<Vec<MessageRef>, RemoteServiceError> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages?labelIds=INBOX&q=is%3Aunread&maxResults={}",
            Self::BASE_URL,
            Self::LIST_MAX_RESULTS
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .map_err(map_http_error)?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| RemoteServiceError::Decode(e.to_string()))?;

        Ok(list.messages.unwrap_or_default())
    }

    /// Get full message details by ID
    pub fn get_message(&self, id: &str) -> Result<GmailMessage, RemoteServiceError> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/messages/{}?format=full", Self::BASE_URL, id);

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .map_err(map_http_error)?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| RemoteServiceError::Decode(e.to_string()))
    }

    /// Get a message with exponential backoff retry on transient failures
    fn get_message_with_retry(&self, id: &str) -> Result<GmailMessage, RemoteServiceError> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 0;

        loop {
            match self.get_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) if e.is_transient() && attempt + 1 < Self::FETCH_RETRIES => {
                    debug!("Fetch of {} failed ({}); retrying", id, e);
                    std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Modify a message's labels
    pub fn modify_message(
        &self,
        id: &str,
        add_label_ids: &[&str],
        remove_label_ids: &[&str],
    ) -> Result<(), RemoteServiceError> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/messages/{}/modify", Self::BASE_URL, id);
        let request = ModifyMessageRequest {
            add_label_ids: add_label_ids.iter().map(|s| s.to_string()).collect(),
            remove_label_ids: remove_label_ids.iter().map(|s| s.to_string()).collect(),
        };

        self.agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request)
            .map_err(map_http_error)?;

        Ok(())
    }
}

impl MailGateway for GmailClient {
    fn list_unread(&self) -> Result<Vec<MessageRef>, RemoteServiceError> {
        self.list_unread_messages()
    }

    fn fetch_content(&self, msg_ref: &MessageRef) -> Result<MessageContent, RemoteServiceError> {
        let message = self.get_message_with_retry(&msg_ref.id)?;
        Ok(extract_content(&message))
    }

    fn apply_verdict(
        &self,
        msg_ref: &MessageRef,
        verdict: Verdict,
    ) -> Result<(), RemoteServiceError> {
        match verdict {
            // Moving to spam also takes the message out of the inbox;
            // applying it again is a no-op on the server side.
            Verdict::Spam => {
                self.modify_message(&msg_ref.id, &[labels::SPAM], &[labels::INBOX])
            }
            // Ham stays in the inbox; nothing to confirm remotely.
            Verdict::Ham => Ok(()),
        }
    }
}

/// Map a ureq error into the gateway error taxonomy
fn map_http_error(e: ureq::Error) -> RemoteServiceError {
    match e {
        ureq::Error::StatusCode(status @ (401 | 403)) => {
            RemoteServiceError::AccessDenied { status }
        }
        ureq::Error::StatusCode(429) => RemoteServiceError::RateLimited,
        ureq::Error::StatusCode(status) => RemoteServiceError::Api { status },
        other => RemoteServiceError::Transport(other.to_string()),
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_http_error_auth() {
        assert!(matches!(
            map_http_error(ureq::Error::StatusCode(401)),
            RemoteServiceError::AccessDenied { status: 401 }
        ));
        assert!(matches!(
            map_http_error(ureq::Error::StatusCode(403)),
            RemoteServiceError::AccessDenied { status: 403 }
        ));
    }

    #[test]
    fn test_map_http_error_rate_limit() {
        assert!(matches!(
            map_http_error(ureq::Error::StatusCode(429)),
            RemoteServiceError::RateLimited
        ));
    }

    #[test]
    fn test_map_http_error_other_status() {
        assert!(matches!(
            map_http_error(ureq::Error::StatusCode(500)),
            RemoteServiceError::Api { status: 500 }
        ));
    }

    #[test]
    fn test_auth_errors_are_not_transient() {
        let e = map_http_error(ureq::Error::StatusCode(401));
        assert!(e.is_auth());
        assert!(!e.is_transient());
    }
}
