//! Mail gateway trait definitions
//!
//! The polling loop talks to the mail service exclusively through
//! [`MailGateway`], which abstracts over the production Gmail client and the
//! in-memory implementation used for testing.

mod memory;

pub use memory::InMemoryGateway;

use crate::gmail::AuthError;
use crate::models::{MessageContent, MessageRef, Verdict};

/// Remote mail service failures.
///
/// Every gateway operation reports its failure explicitly; the caller
/// decides the retry policy. Per-message failures (fetch or relabel of one
/// message) must not abort a cycle; a listing failure aborts it early.
#[derive(Debug, thiserror::Error)]
pub enum RemoteServiceError {
    /// No valid credential could be produced for the call
    #[error("credential unavailable: {0}")]
    Credential(#[from] AuthError),

    /// The service rejected our credential (HTTP 401/403)
    #[error("access rejected by the mail service (HTTP {status})")]
    AccessDenied { status: u16 },

    /// The service asked us to slow down (HTTP 429)
    #[error("rate limited by the mail service")]
    RateLimited,

    /// Any other API-level rejection
    #[error("mail service returned HTTP {status}")]
    Api { status: u16 },

    /// Connection, DNS, TLS, or timeout failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body was not what we expected
    #[error("failed to decode mail service response: {0}")]
    Decode(String),
}

impl RemoteServiceError {
    /// Whether this failure indicates a broken credential rather than a
    /// transient service problem
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Credential(_) | Self::AccessDenied { .. }
        )
    }

    /// Whether retrying the same call shortly is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transport(_))
    }
}

/// Trait for the remote mail service operations the triage loop needs.
///
/// All three operations require a valid credential; implementations obtain
/// one per call so an expired token is refreshed before the request goes
/// out.
pub trait MailGateway: Send + Sync {
    /// List unread inbox messages.
    ///
    /// Returns an empty vec (not an error) when there is nothing unread.
    fn list_unread(&self) -> Result<Vec<MessageRef>, RemoteServiceError>;

    /// Fetch the full message and extract its classifiable content
    fn fetch_content(&self, msg_ref: &MessageRef) -> Result<MessageContent, RemoteServiceError>;

    /// Apply the verdict's label mutation.
    ///
    /// Spam adds the spam label and removes the message from the inbox;
    /// ham leaves the message untouched. Idempotent: applying the same
    /// verdict twice produces the same end state.
    fn apply_verdict(
        &self,
        msg_ref: &MessageRef,
        verdict: Verdict,
    ) -> Result<(), RemoteServiceError>;
}
