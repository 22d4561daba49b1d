//! Shared error types for configuration and authentication.
//!
//! Each type carries a `user_message()` with an actionable, non-technical
//! hint that the CLI prints after the full error chain.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Check the --config path.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Authentication errors (OAuth, tokens, credentials).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client secrets not found: {0}")]
    CredentialsNotFound(String),

    #[error("Invalid client secrets: {0}")]
    InvalidCredentials(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("OAuth callback not received within {0} seconds")]
    OAuthTimedOut(u64),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Token storage error: {0}")]
    StorageError(String),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::CredentialsNotFound(_) => {
                "Download an OAuth client (Desktop app) from the Google Cloud console and set auth.credentials_path."
            }
            AuthError::InvalidCredentials(_) => {
                "The client secrets file is not a Google OAuth client file."
            }
            AuthError::RefreshFailed(_) => {
                "Your session could not be renewed. Run `gcal-automate auth` to sign in again."
            }
            AuthError::OAuthFailed(_) => "Sign-in failed. Please try again.",
            AuthError::OAuthTimedOut(_) => "Sign-in was not completed in the browser.",
            AuthError::StateMismatch => {
                "Sign-in response was not for this request. Please try again."
            }
            AuthError::StorageError(_) => "Failed to save credentials. Check the token path.",
        }
    }
}
