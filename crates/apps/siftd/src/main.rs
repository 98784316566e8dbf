//! siftd - automated inbox spam triage daemon
//!
//! Loads the frozen classifier artifact and the Gmail credentials, then
//! runs the classification polling loop on a background worker until the
//! process is terminated. Launching the daemon is the "start" trigger;
//! status is reported through the logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use triage::{
    Classifier, ClassifierArtifact, FilterLoop, FilterStatus, GmailAuth, GmailClient,
    GmailCredentials, SiftConfig,
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    config::init().context("Failed to initialize config directory")?;
    let settings = SiftConfig::load().context("Failed to load daemon settings")?;

    // The classifier artifact is required; without it there is no valid
    // degraded mode, so a load failure ends the process here.
    let vectorizer_path = settings.vectorizer_path()?;
    let model_path = settings.model_path()?;
    let artifact = ClassifierArtifact::load(&vectorizer_path, &model_path)
        .context("Failed to load classifier artifact")?;
    info!(
        "Loaded classifier artifact ({} features)",
        artifact.vectorizer.features()
    );

    let credentials = match GmailCredentials::load() {
        Ok(creds) => creds,
        Err(e) => {
            if let Some(path) = GmailCredentials::default_credentials_path() {
                warn!(
                    "To configure Gmail access, either:\n\
                     1. Place your Google OAuth credentials at: {}\n\
                     2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                    path.display()
                );
            }
            return Err(e.context("Gmail credentials not found"));
        }
    };

    let auth = GmailAuth::new(credentials.client_id, credentials.client_secret)?;
    let gateway = Arc::new(GmailClient::new(auth));
    let classifier = Arc::new(Classifier::new(artifact));

    info!("Status: {}", FilterStatus::NotStarted);
    let filter = FilterLoop::new(
        gateway,
        classifier,
        Duration::from_secs(settings.poll_interval_secs),
    );
    let handle = filter.start();
    info!("Status: {}", handle.status());

    // The loop runs until the process is terminated
    handle.join();
    Ok(())
}
