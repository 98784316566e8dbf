//! Gmail OAuth2 authentication
//!
//! Implements the OAuth2 authorization code flow with a local loopback
//! server for the consent callback, plus non-interactive token refresh.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.
//!
//! The persisted token is owned exclusively by [`GmailAuth`]: it is written
//! after every creation or refresh, before the access token is handed out.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;

/// Credential lifecycle failures.
///
/// Fatal to the current polling cycle, never to the process - the loop backs
/// off and retries.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token endpoint rejected the request: {0}")]
    TokenEndpoint(String),

    #[error("consent flow failed: {0}")]
    Consent(String),

    #[error("could not persist credential to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not determine token storage path")]
    NoTokenPath,
}

/// Persisted credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer valid
    pub expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// The next step the credential lifecycle requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// The stored access token is still fresh
    UseCached,
    /// Expired, but a refresh token allows non-interactive renewal
    Refresh,
    /// No usable credential - interactive consent is required
    Consent,
}

/// Seconds of remaining validity below which a token counts as expired
const EXPIRY_SLACK_SECS: i64 = 60;

/// Decide what the credential lifecycle requires for the given stored token.
///
/// Pure so the lifecycle is testable without the network: a token with no
/// recorded expiry is treated as expired, since there is no way to know it
/// is still good.
pub fn auth_step(token: Option<&StoredToken>, now: i64) -> AuthStep {
    match token {
        Some(t) if t.expires_at.is_some_and(|e| e > now + EXPIRY_SLACK_SECS) => AuthStep::UseCached,
        Some(t) if t.refresh_token.is_some() => AuthStep::Refresh,
        _ => AuthStep::Consent,
    }
}

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Required scope (modify allows read + label changes)
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Port range to try for the local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create a new GmailAuth storing its token in the Sift config directory
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AuthError> {
        let token_path = config::config_path("gmail-tokens.json").ok_or(AuthError::NoTokenPath)?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create a GmailAuth with an explicit token path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
        }
    }

    /// Get a valid access token, refreshing or re-authenticating as needed.
    ///
    /// Any newly obtained token is persisted before this returns.
    pub fn get_access_token(&self) -> Result<String, AuthError> {
        let stored = self.load_token();
        let now = chrono::Utc::now().timestamp();

        match auth_step(stored.as_ref(), now) {
            AuthStep::UseCached => {
                // auth_step only returns UseCached for a present token
                Ok(stored.map(|t| t.access_token).unwrap_or_default())
            }
            AuthStep::Refresh => {
                let refresh_token = stored.and_then(|t| t.refresh_token).unwrap_or_default();
                let token = self.refresh_access_token(&refresh_token)?;
                self.save_token(&token)?;
                debug!("Refreshed Gmail access token");
                Ok(token.access_token)
            }
            AuthStep::Consent => {
                let token = self.authorization_code_auth()?;
                self.save_token(&token)?;
                info!("Obtained new Gmail credential via consent flow");
                Ok(token.access_token)
            }
        }
    }

    /// Perform the interactive authorization code flow
    fn authorization_code_auth(&self) -> Result<StoredToken, AuthError> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
        );

        info!("Gmail authentication required; opening browser");
        if let Err(e) = open::that(&auth_url) {
            warn!(
                "Failed to open browser: {}. Visit this URL manually: {}",
                e, auth_url
            );
        }

        let code = self.wait_for_callback(listener)?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .map_err(|e| AuthError::TokenEndpoint(e.to_string()))?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| AuthError::TokenEndpoint(format!("unparseable token response: {}", e)))?;

        Ok(Self::stamp(token, None))
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16), AuthError> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        Err(AuthError::Consent(format!(
            "could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )))
    }

    /// Wait for the OAuth callback and extract the authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String, AuthError> {
        let (mut stream, _) = listener
            .accept()
            .map_err(|e| AuthError::Consent(format!("failed to accept connection: {}", e)))?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .map_err(|e| AuthError::Consent(format!("failed to read request: {}", e)))?;

        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = query_param(&request_line, "code");
        let error = query_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            return Err(AuthError::Consent(format!("provider returned: {}", err)));
        }

        code.ok_or_else(|| AuthError::Consent("no authorization code received".to_string()))
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<StoredToken, AuthError> {
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| AuthError::TokenEndpoint(e.to_string()))?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| AuthError::TokenEndpoint(format!("unparseable refresh response: {}", e)))?;

        // Google omits the refresh token on refresh; keep the old one
        Ok(Self::stamp(token, Some(refresh_token.to_string())))
    }

    /// Convert a token endpoint response into a persistable token
    fn stamp(token: TokenResponse, fallback_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(fallback_refresh),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        }
    }

    /// Load the stored token from disk.
    ///
    /// Missing or corrupt files mean "no credential" and trigger consent.
    fn load_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Stored token at {} is unreadable ({}); re-authenticating",
                    self.token_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist the token to disk, creating parent directories as needed
    fn save_token(&self, token: &StoredToken) -> Result<(), AuthError> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AuthError::Persist {
                path: self.token_path.clone(),
                source: e,
            })?;
        }

        let content = serde_json::to_string_pretty(token).map_err(|e| AuthError::Persist {
            path: self.token_path.clone(),
            source: std::io::Error::other(e),
        })?;
        fs::write(&self.token_path, content).map_err(|e| AuthError::Persist {
            path: self.token_path.clone(),
            source: e,
        })
    }
}

/// Extract a query parameter from an HTTP request line
fn query_param(request_line: &str, name: &str) -> Option<String> {
    request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split('?').nth(1))
        .and_then(|query| {
            query.split('&').find_map(|param| {
                let mut parts = param.split('=');
                if parts.next() == Some(name) {
                    parts.next().map(|s| s.to_string())
                } else {
                    None
                }
            })
        })
}
