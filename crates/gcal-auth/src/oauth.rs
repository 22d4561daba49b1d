//! Installed-application OAuth2 flow: consent in the browser, code delivered
//! to a loopback callback server on an ephemeral port.

use anyhow::{Context, Result};
use gcal_core::AuthError;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret as OAuthClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use warp::Filter;

use crate::google::{ClientSecret, CALENDAR_SCOPE};
use crate::storage::TokenSet;

const CALLBACK_PATH: &str = "callback";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization successful!</h1><p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1><p>Return to the terminal for details.</p></body></html>";

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl From<HashMap<String, String>> for CallbackParams {
    fn from(mut params: HashMap<String, String>) -> Self {
        Self {
            code: params.remove("code"),
            state: params.remove("state"),
            error: params.remove("error"),
        }
    }
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// An authorization request waiting for the browser round-trip.
pub struct PendingAuthorization {
    pub url: String,
    pub redirect_uri: String,
    csrf_token: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
}

impl PendingAuthorization {
    /// Check the callback belongs to this request and extract the code.
    pub fn verify_callback(&self, params: &CallbackParams) -> Result<String, AuthError> {
        if let Some(error) = &params.error {
            return Err(AuthError::OAuthFailed(format!("consent denied: {}", error)));
        }

        if params.state.as_deref() != Some(self.csrf_token.secret().as_str()) {
            return Err(AuthError::StateMismatch);
        }

        params
            .code
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AuthError::OAuthFailed("callback carried no authorization code".to_string())
            })
    }
}

pub struct InstalledFlow {
    secret: ClientSecret,
    scopes: Vec<String>,
}

impl InstalledFlow {
    /// Flow requesting the Calendar scope.
    pub fn new(secret: ClientSecret) -> Self {
        Self {
            secret,
            scopes: vec![CALENDAR_SCOPE.to_string()],
        }
    }

    fn client(&self, redirect_uri: &str) -> Result<BasicClient> {
        Ok(BasicClient::new(
            ClientId::new(self.secret.client_id.clone()),
            Some(OAuthClientSecret::new(self.secret.client_secret.clone())),
            AuthUrl::new(self.secret.auth_uri.clone()).context("Invalid auth URL")?,
            Some(TokenUrl::new(self.secret.token_uri.clone()).context("Invalid token URL")?),
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string()).context("Invalid redirect URI")?,
        ))
    }

    /// Build the consent URL for a callback server listening on `port`.
    pub fn authorization_url(&self, port: u16) -> Result<PendingAuthorization> {
        let redirect_uri = format!("http://127.0.0.1:{}/{}", port, CALLBACK_PATH);
        let client = self.client(&redirect_uri)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        // offline access is what yields a refresh token
        let (auth_url, csrf_token) = auth_request
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(PendingAuthorization {
            url: auth_url.to_string(),
            redirect_uri,
            csrf_token,
            pkce_verifier,
        })
    }

    /// Exchange the authorization code for tokens.
    #[tracing::instrument(skip_all, level = "info")]
    pub async fn exchange_code(
        &self,
        pending: PendingAuthorization,
        code: String,
    ) -> Result<TokenSet> {
        let client = self.client(&pending.redirect_uri)?;

        let token_result = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pending.pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::OAuthFailed(format!("code exchange failed: {}", e)))?;

        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);
        let expires_at = chrono::Utc::now().timestamp() + expires_in;

        let scopes = token_result
            .scopes()
            .map(|s| s.iter().map(|scope| scope.as_str().to_string()).collect())
            .unwrap_or_else(|| self.scopes.clone());

        Ok(TokenSet {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
            expires_at,
            scopes,
        })
    }

    /// Perform the full flow with browser and local callback server
    pub async fn authenticate(&self) -> Result<TokenSet> {
        let (tx, rx) = oneshot::channel();
        let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));

        let routes = warp::get()
            .and(warp::path(CALLBACK_PATH))
            .and(warp::path::end())
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::any().map(move || tx.clone()))
            .and_then(handle_callback);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| {
                AuthError::OAuthFailed(format!("could not start callback server: {}", e))
            })?;
        let server = tokio::spawn(server);

        tracing::info!("Listening for OAuth callback on {}", addr);

        let pending = self.authorization_url(addr.port())?;

        tracing::info!("Opening browser for Google authorization...");
        tracing::info!("If the browser does not open, visit: {}", pending.url);
        if let Err(e) = webbrowser::open(&pending.url) {
            tracing::warn!("Failed to open browser: {}", e);
        }

        let received = tokio::time::timeout(CALLBACK_TIMEOUT, rx).await;

        let _ = shutdown_tx.send(());
        let _ = server.await;

        let params = match received {
            Ok(Ok(params)) => params,
            Ok(Err(_)) => {
                return Err(AuthError::OAuthFailed("callback server closed".to_string()).into())
            }
            Err(_) => return Err(AuthError::OAuthTimedOut(CALLBACK_TIMEOUT.as_secs()).into()),
        };

        let code = pending.verify_callback(&params)?;
        let token_set = self.exchange_code(pending, code).await?;

        tracing::info!("OAuth2 flow completed");
        Ok(token_set)
    }
}

async fn handle_callback(
    params: HashMap<String, String>,
    tx: CallbackSender,
) -> Result<warp::reply::Html<&'static str>, warp::Rejection> {
    let params = CallbackParams::from(params);
    let page = if params.error.is_some() || params.code.is_none() {
        FAILURE_PAGE
    } else {
        SUCCESS_PAGE
    };

    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(params);
    }

    Ok(warp::reply::html(page))
}
