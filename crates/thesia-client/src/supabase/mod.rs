//! Supabase-compatible auth (GoTrue) and table (PostgREST) access.

mod auth;
mod projects;

pub use auth::{Redirector, SupabaseAuth};
pub use projects::SupabaseProjectStore;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;

use thesia_core::errors::AuthError;
use thesia_core::models::User;
use thesia_core::ThesiaConfig;

/// Project URL, anon key and a shared HTTP client.
#[derive(Clone)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &ThesiaConfig) -> Result<Self, AuthError> {
        if config.supabase_url.is_empty() {
            return Err(AuthError::NotConfigured(
                "supabase_url is not set (SUPABASE_URL)".to_string(),
            ));
        }
        if config.supabase_anon_key.is_empty() {
            return Err(AuthError::NotConfigured(
                "supabase_anon_key is not set (SUPABASE_ANON_KEY)".to_string(),
            ));
        }
        Ok(Self::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request carrying the anon key, authorized as `access_token` when given.
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
    ) -> RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .timeout(self.timeout)
    }

    /// The user owning `access_token`, or `None` when the token is rejected.
    pub(crate) async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, AuthError> {
        let response = self
            .request(Method::GET, "/auth/v1/user", Some(access_token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            log::warn!("Access token rejected when resolving the current user ({})", status);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(provider_error(response).await);
        }

        let user = response
            .json::<User>()
            .await
            .map_err(|e| AuthError::Provider {
                status: status.as_u16(),
                message: format!("unexpected user payload: {}", e),
            })?;
        Ok(Some(user))
    }
}

/// Reads a GoTrue/PostgREST error body into an [`AuthError::Provider`].
pub(crate) async fn provider_error(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AuthError::Provider {
        status,
        message: error_message(&body),
    }
}

pub(crate) fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
    });

    match message {
        Some(message) => message.to_string(),
        None => body.trim().to_string(),
    }
}
