use anyhow::{Context, Result};
use gcal_core::AuthError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Seconds before expiry at which a token is proactively refreshed.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Token set for OAuth2 authentication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    /// Access token for API requests
    pub access_token: String,

    /// Optional refresh token for token renewal
    pub refresh_token: Option<String>,

    /// Token expiration timestamp (Unix timestamp)
    pub expires_at: i64,

    /// Scopes granted to this token
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl TokenSet {
    /// Check if the token needs refresh (within 5 minutes of expiry)
    pub fn needs_refresh(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at
    }

    /// Whether the token was granted the given scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// File-backed token cache (`token.json`).
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a token set, creating the parent directory if needed
    pub fn store(&self, token_set: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AuthError::StorageError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let json = serde_json::to_string_pretty(token_set)
            .context("Failed to serialize token set")?;

        fs::write(&self.path, &json)
            .map_err(|e| AuthError::StorageError(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!("Stored token at {}", self.path.display());
        Ok(())
    }

    /// Load the stored token set, or `None` when no token file exists
    pub fn load(&self) -> Result<Option<TokenSet>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;

        let token_set: TokenSet = serde_json::from_str(&json)
            .with_context(|| format!("Failed to deserialize token file {}", self.path.display()))?;

        tracing::debug!("Loaded token from {}", self.path.display());
        Ok(Some(token_set))
    }

    /// Delete the stored token set. Missing files are not an error.
    pub fn delete(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        fs::remove_file(&self.path)
            .map_err(|e| AuthError::StorageError(format!("{}: {}", self.path.display(), e)))?;
        tracing::info!("Deleted token at {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn token(expires_at: i64) -> TokenSet {
        TokenSet {
            access_token: "test".to_string(),
            refresh_token: None,
            expires_at,
            scopes: vec![],
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = chrono::Utc::now().timestamp();

        // Expired token
        let expired = token(now - 3600);
        assert!(expired.is_expired());
        assert!(expired.needs_refresh());

        // Valid token
        let valid = token(now + 3600);
        assert!(!valid.is_expired());
        assert!(!valid.needs_refresh());

        // Needs refresh soon
        let soon = token(now + 200);
        assert!(!soon.is_expired());
        assert!(soon.needs_refresh());
    }

    #[test]
    fn test_store_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens").join("token.json"));

        assert!(store.load().unwrap().is_none());

        let mut set = token(1_900_000_000);
        set.refresh_token = Some("refresh".to_string());
        set.scopes = vec!["https://www.googleapis.com/auth/calendar".to_string()];
        store.store(&set).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, set);
        assert!(loaded.has_scope("https://www.googleapis.com/auth/calendar"));

        assert!(store.delete().unwrap());
        assert!(!store.path().exists());
        assert!(!store.delete().unwrap());
    }

    #[test]
    fn test_corrupt_token_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().is_err());
    }
}
