use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use thesia_core::errors::AuthError;
use thesia_core::models::{AuthEvent, AuthStateChange, OAuthProvider, Session, User};
use thesia_core::IdentityProvider;

use super::{provider_error, SupabaseClient};

/// Sends the user to the provider's consent page. A browser would navigate; a
/// terminal prints the URL.
pub trait Redirector: Send + Sync {
    fn redirect(&self, url: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

/// Token fields carried in the callback URL after the implicit OAuth flow.
#[derive(Debug, Default, PartialEq)]
struct CallbackTokens {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

/// Session lifecycle against a Supabase auth service.
///
/// The session lives in memory and, when a session file is configured, on disk
/// so a later process picks it up. Every change is broadcast to subscribers.
pub struct SupabaseAuth {
    supabase: SupabaseClient,
    redirector: Arc<dyn Redirector>,
    session: Mutex<Option<Session>>,
    session_file: Option<PathBuf>,
    restored: AtomicBool,
    changes: broadcast::Sender<AuthStateChange>,
}

impl SupabaseAuth {
    pub fn new(supabase: SupabaseClient, redirector: Arc<dyn Redirector>) -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            supabase,
            redirector,
            session: Mutex::new(None),
            session_file: None,
            restored: AtomicBool::new(false),
            changes,
        }
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    pub fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.supabase.url("/auth/v1/authorize"),
            provider,
            urlencoding::encode(redirect_to)
        )
    }

    /// Finishes the OAuth flow from the URL the provider redirected back to.
    pub async fn complete_sign_in(&self, callback_url: &str) -> Result<Session, AuthError> {
        let tokens = parse_callback(callback_url)?;
        let expires_at = tokens
            .expires_in
            .map(|secs| {
                Session::expiry_after(secs, Utc::now()).ok_or_else(|| {
                    AuthError::InvalidCallback(format!("expires_in is out of range: {}", secs))
                })
            })
            .transpose()?;
        let user = self
            .supabase
            .fetch_user(&tokens.access_token)
            .await?
            .ok_or_else(|| AuthError::InvalidCallback("access token was rejected".to_string()))?;

        let mut session = Session::new(tokens.access_token, user);
        session.refresh_token = tokens.refresh_token;
        if let Some(token_type) = tokens.token_type {
            session.token_type = token_type;
        }
        session.expires_at = expires_at;

        self.store(Some(session.clone())).await;
        self.notify(AuthEvent::SignedIn, Some(session.clone()));
        log::info!("Signed in as {}", session.user.display_name().unwrap_or(session.user_id()));

        Ok(session)
    }

    /// Exchanges the refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .current()
            .and_then(|session| session.refresh_token)
            .ok_or(AuthError::NoSession)?;

        let response = self
            .supabase
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let status = response.status().as_u16();
        let tokens: TokenResponse = response.json().await.map_err(|e| AuthError::Provider {
            status,
            message: format!("unexpected token payload: {}", e),
        })?;

        let mut session = Session::new(tokens.access_token, tokens.user);
        session.refresh_token = tokens.refresh_token.or(Some(refresh_token));
        if let Some(token_type) = tokens.token_type {
            session.token_type = token_type;
        }
        if let Some(expires_in) = tokens.expires_in {
            session.expires_at = Some(Session::expiry_after(expires_in, Utc::now()).ok_or_else(
                || AuthError::Provider {
                    status,
                    message: format!("expires_in is out of range: {}", expires_in),
                },
            )?);
        }

        self.store(Some(session.clone())).await;
        self.notify(AuthEvent::TokenRefreshed, Some(session.clone()));
        log::debug!("Refreshed session for user {}", session.user.id);

        Ok(session)
    }

    fn current(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    fn notify(&self, event: AuthEvent, session: Option<Session>) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(AuthStateChange::new(event, session));
    }

    async fn store(&self, session: Option<Session>) {
        *lock(&self.session) = session.clone();
        self.restored.store(true, Ordering::SeqCst);

        let Some(path) = &self.session_file else {
            return;
        };
        let result = match session {
            Some(session) => write_session(path, &session).await,
            None => remove_session(path).await,
        };
        if let Err(e) = result {
            log::warn!("Failed to update session file {}: {}", path.display(), e);
        }
    }

    async fn restore(&self) -> Option<Session> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return self.current();
        }
        let path = self.session_file.as_ref()?;

        match read_session(path).await {
            Ok(Some(session)) => {
                log::debug!("Restored session from {}", path.display());
                *lock(&self.session) = Some(session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    /// The current session, restored from disk on first use. An expired session
    /// is refreshed; if that fails the user is treated as signed out.
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.restore().await else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Network(message)) => Err(AuthError::Network(message)),
            Err(e) => {
                log::warn!("Session expired and could not be refreshed: {}", e);
                self.store(None).await;
                self.notify(AuthEvent::SignedOut, None);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        let url = self.authorize_url(provider, redirect_to);
        log::debug!("Starting {} sign-in, returning to {}", provider, redirect_to);
        self.redirector.redirect(&url)
    }

    /// Revokes the session remotely. Local state is cleared and `SignedOut`
    /// broadcast even when the remote call fails.
    async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = match self.restore().await {
            Some(session) => {
                let result = self
                    .supabase
                    .request(Method::POST, "/auth/v1/logout", Some(session.access_token.as_str()))
                    .send()
                    .await;
                match result {
                    Ok(response) if response.status().is_success() => Ok(()),
                    Ok(response) => Err(provider_error(response).await),
                    Err(e) => Err(AuthError::from(e)),
                }
            }
            None => Ok(()),
        };

        self.store(None).await;
        self.notify(AuthEvent::SignedOut, None);
        remote
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.changes.subscribe()
    }
}

/// Reads the token fields from the URL fragment (implicit flow) or, failing
/// that, the query string.
fn parse_callback(callback_url: &str) -> Result<CallbackTokens, AuthError> {
    let params = callback_url
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .or_else(|| callback_url.split_once('?').map(|(_, query)| query))
        .ok_or_else(|| AuthError::InvalidCallback("URL carries no parameters".to_string()))?;

    let mut tokens = CallbackTokens::default();
    let mut error = None;
    let mut error_description = None;

    for pair in params.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.into_owned())
            .map_err(|e| AuthError::InvalidCallback(format!("bad encoding in '{}': {}", key, e)))?;

        match key {
            "access_token" => tokens.access_token = value,
            "refresh_token" => tokens.refresh_token = Some(value),
            "token_type" => tokens.token_type = Some(value),
            "expires_in" => {
                tokens.expires_in = Some(value.parse().map_err(|_| {
                    AuthError::InvalidCallback(format!("expires_in is not a number: {}", value))
                })?)
            }
            "error" => error = Some(value),
            "error_description" => error_description = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::InvalidCallback(error_description.unwrap_or(error)));
    }
    if tokens.access_token.is_empty() {
        return Err(AuthError::InvalidCallback(
            "no access_token in callback URL".to_string(),
        ));
    }

    Ok(tokens)
}

async fn read_session(path: &Path) -> Result<Option<Session>, AuthError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AuthError::Storage(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AuthError::Storage(e.to_string())),
    }
}

async fn write_session(path: &Path, session: &Session) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
    }
    let content =
        serde_json::to_string_pretty(session).map_err(|e| AuthError::Storage(e.to_string()))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AuthError::Storage(e.to_string()))
}

async fn remove_session(path: &Path) -> Result<(), AuthError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AuthError::Storage(e.to_string())),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
