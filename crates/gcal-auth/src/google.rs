//! Google OAuth2 client secrets and token endpoint calls.

use anyhow::{Context, Result};
use gcal_core::AuthError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::storage::TokenSet;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read/write access to events on all calendars the user can reach.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// One section (`installed` or `web`) of a Google client secrets file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Load `credentials.json` as downloaded from the Google Cloud console.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AuthError::CredentialsNotFound(path.display().to_string()).into());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client secrets {}", path.display()))?;

        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;

        let secret = file.installed.or(file.web).ok_or_else(|| {
            let reason = "expected an \"installed\" or \"web\" section";
            AuthError::InvalidCredentials(reason.to_string())
        })?;

        secret.validate()?;
        Ok(secret)
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("client_id is empty".to_string()));
        }
        for (name, value) in [("auth_uri", &self.auth_uri), ("token_uri", &self.token_uri)] {
            let url = Url::parse(value)
                .map_err(|e| AuthError::InvalidCredentials(format!("{}: {}", name, e)))?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(AuthError::InvalidCredentials(format!(
                    "{} must use http or https, got: {}",
                    name,
                    url.scheme()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

impl GoogleTokenResponse {
    /// Convert into a storable token set.
    ///
    /// Google omits `refresh_token` on refresh responses, so the previous one
    /// is carried over.
    pub fn into_token_set(self, previous_refresh_token: Option<String>) -> TokenSet {
        let expires_at = chrono::Utc::now().timestamp() + self.expires_in as i64;
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at,
            scopes: self.scope.split_whitespace().map(str::to_string).collect(),
        }
    }
}

pub struct GoogleOAuth2Provider {
    secret: ClientSecret,
    client: reqwest::Client,
}

impl GoogleOAuth2Provider {
    pub fn new(secret: ClientSecret) -> Self {
        Self {
            secret,
            client: reqwest::Client::new(),
        }
    }

    /// Refresh an expired access token.
    #[tracing::instrument(skip(self, refresh_token), level = "info")]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        let response = self
            .client
            .post(&self.secret.token_uri)
            .form(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to send refresh request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("{}: {}", status, error_text)).into());
        }

        let token = response
            .json::<GoogleTokenResponse>()
            .await
            .context("Failed to parse refresh response")?;

        Ok(token.into_token_set(Some(refresh_token.to_string())))
    }
}
