//! Obtain a usable access token: cached, refreshed, or freshly authorized.

use anyhow::Result;
use std::path::Path;

use crate::google::{ClientSecret, GoogleOAuth2Provider};
use crate::oauth::InstalledFlow;
use crate::storage::{TokenSet, TokenStore};

/// How a token was obtained, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cached,
    Refreshed,
    Authorized,
}

/// Return a valid token, running the browser flow only when the cache can't
/// be used or renewed.
pub async fn authorize(credentials_path: &Path, token_path: &Path) -> Result<TokenSet> {
    let store = TokenStore::new(token_path);
    let (token, source) = load_or_refresh(credentials_path, &store).await?;

    match token {
        Some(token) => {
            tracing::info!("Using {:?} token from {}", source, token_path.display());
            Ok(token)
        }
        None => sign_in(credentials_path, &store).await,
    }
}

/// Always run the interactive flow and overwrite the cached token.
pub async fn sign_in(credentials_path: &Path, store: &TokenStore) -> Result<TokenSet> {
    let secret = ClientSecret::from_file(credentials_path)?;
    let token = InstalledFlow::new(secret).authenticate().await?;
    store.store(&token)?;
    tracing::info!("Using {:?} token", TokenSource::Authorized);
    Ok(token)
}

/// Cached token if still fresh, refreshed token if renewable, otherwise `None`.
async fn load_or_refresh(
    credentials_path: &Path,
    store: &TokenStore,
) -> Result<(Option<TokenSet>, TokenSource)> {
    let cached = match store.load() {
        Ok(cached) => cached,
        Err(e) => {
            tracing::warn!("Ignoring unreadable token cache: {:#}", e);
            None
        }
    };

    let Some(cached) = cached else {
        return Ok((None, TokenSource::Authorized));
    };

    if !cached.needs_refresh() {
        return Ok((Some(cached), TokenSource::Cached));
    }

    let Some(refresh_token) = cached.refresh_token.clone() else {
        tracing::info!("Cached token expired and has no refresh token");
        return Ok((None, TokenSource::Authorized));
    };

    let provider = GoogleOAuth2Provider::new(ClientSecret::from_file(credentials_path)?);
    match provider.refresh_token(&refresh_token).await {
        Ok(mut refreshed) => {
            if refreshed.scopes.is_empty() {
                refreshed.scopes = cached.scopes;
            }
            store.store(&refreshed)?;
            Ok((Some(refreshed), TokenSource::Refreshed))
        }
        Err(e) => {
            tracing::warn!("Token refresh failed, re-authorizing: {:#}", e);
            Ok((None, TokenSource::Authorized))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_secrets(dir: &Path, token_uri: &str) -> std::path::PathBuf {
        let path = dir.join("credentials.json");
        let json = serde_json::json!({
            "installed": {
                "client_id": "client",
                "client_secret": "secret",
                "token_uri": token_uri
            }
        });
        std::fs::write(&path, json.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_fresh_cached_token_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let token = TokenSet {
            access_token: "cached".to_string(),
            refresh_token: None,
            expires_at: chrono::Utc::now().timestamp() + 3600,
            scopes: vec![],
        };
        store.store(&token).unwrap();

        // no credentials file needed for a fresh token
        let (loaded, source) = load_or_refresh(&dir.path().join("missing.json"), &store)
            .await
            .unwrap();
        assert_eq!(loaded.unwrap().access_token, "cached");
        assert_eq!(source, TokenSource::Cached);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_and_stored() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "renewed",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let secrets = write_secrets(dir.path(), &format!("{}/token", mock_server.uri()));
        let store = TokenStore::new(dir.path().join("token.json"));
        store
            .store(&TokenSet {
                access_token: "stale".to_string(),
                refresh_token: Some("refresh-me".to_string()),
                expires_at: chrono::Utc::now().timestamp() - 10,
                scopes: vec!["scope-a".to_string()],
            })
            .unwrap();

        let (token, source) = load_or_refresh(&secrets, &store).await.unwrap();
        let token = token.unwrap();
        assert_eq!(source, TokenSource::Refreshed);
        assert_eq!(token.access_token, "renewed");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-me"));
        assert_eq!(token.scopes, vec!["scope-a".to_string()]);

        let persisted = store.load().unwrap().unwrap();
        assert_eq!(persisted.access_token, "renewed");
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_sign_in() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let secrets = write_secrets(dir.path(), &format!("{}/token", mock_server.uri()));
        let store = TokenStore::new(dir.path().join("token.json"));
        store
            .store(&TokenSet {
                access_token: "stale".to_string(),
                refresh_token: Some("revoked".to_string()),
                expires_at: 0,
                scopes: vec![],
            })
            .unwrap();

        let (token, source) = load_or_refresh(&secrets, &store).await.unwrap();
        assert!(token.is_none());
        assert_eq!(source, TokenSource::Authorized);
    }

    #[tokio::test]
    async fn test_missing_cache_requires_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let (token, _) = load_or_refresh(&dir.path().join("credentials.json"), &store)
            .await
            .unwrap();
        assert!(token.is_none());
    }
}
