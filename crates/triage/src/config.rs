//! Configuration loading for the triage daemon
//!
//! Two pieces live in the Sift config directory:
//! - OAuth client credentials (Google Cloud Console format), with the same
//!   priority order the rest of the tooling uses: compile-time embedded,
//!   JSON file, then runtime environment variables
//! - Daemon settings: artifact paths and the polling cadence

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials filename in the Sift config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Daemon settings filename in the Sift config directory
const SETTINGS_FILE: &str = "sift.json";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/sift/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Get the default credentials file path (~/.config/sift/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Daemon settings (~/.config/sift/sift.json)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Path to the fitted vectorizer state; defaults to
    /// ~/.config/sift/vectorizer.json
    pub vectorizer_path: Option<PathBuf>,
    /// Path to the fitted model state; defaults to
    /// ~/.config/sift/model.json
    pub model_path: Option<PathBuf>,
    /// Seconds to sleep between polling cycles
    pub poll_interval_secs: u64,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            vectorizer_path: None,
            model_path: None,
            poll_interval_secs: 60,
        }
    }
}

impl SiftConfig {
    /// Load the settings file, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolved path of the vectorizer artifact
    pub fn vectorizer_path(&self) -> Result<PathBuf> {
        resolve_artifact_path(self.vectorizer_path.clone(), "vectorizer.json")
    }

    /// Resolved path of the model artifact
    pub fn model_path(&self) -> Result<PathBuf> {
        resolve_artifact_path(self.model_path.clone(), "model.json")
    }
}

fn resolve_artifact_path(configured: Option<PathBuf>, default_name: &str) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path),
        None => config::config_path(default_name).context("Could not determine config directory"),
    }
}
