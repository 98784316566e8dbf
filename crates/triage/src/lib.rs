//! Triage crate - Business logic for automated inbox spam triage
//!
//! This crate provides everything the Sift daemon needs to keep an inbox
//! clean:
//! - Domain models (MessageRef, MessageContent, Verdict)
//! - Gmail API client and OAuth authentication
//! - Plain-text body extraction from multipart payloads
//! - A frozen TF-IDF + linear-model classifier loaded once at startup
//! - The polling loop that ties them together on a fixed cadence
//!
//! This crate has zero UI dependencies; the daemon binary under
//! `crates/apps/siftd` is a thin shell around it.

pub mod classify;
pub mod config;
pub mod gateway;
pub mod gmail;
pub mod models;
pub mod poll;

pub use classify::{Classifier, ClassifierArtifact, LinearModel, ModelLoadError, TfidfVectorizer};
pub use config::{GmailCredentials, SiftConfig};
pub use gateway::{InMemoryGateway, MailGateway, RemoteServiceError};
pub use gmail::{AuthError, AuthStep, GmailAuth, GmailClient, StoredToken, auth_step};
pub use models::{MessageContent, MessageRef, Verdict, labels};
pub use poll::{CycleStats, FilterHandle, FilterLoop, FilterStatus, run_cycle};
