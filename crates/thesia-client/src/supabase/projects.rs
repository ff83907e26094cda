use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use thesia_core::errors::StoreError;
use thesia_core::models::User;
use thesia_core::{DocumentStore, IdentityProvider};

use super::{provider_error, SupabaseAuth, SupabaseClient};

#[derive(Debug, Deserialize)]
struct ContentRow {
    #[serde(default)]
    content: Value,
}

/// Project documents in a PostgREST table keyed by `user_id`.
pub struct SupabaseProjectStore {
    supabase: SupabaseClient,
    auth: Arc<SupabaseAuth>,
    table: String,
}

impl SupabaseProjectStore {
    pub fn new(supabase: SupabaseClient, auth: Arc<SupabaseAuth>, table: impl Into<String>) -> Self {
        Self {
            supabase,
            auth,
            table: table.into(),
        }
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        self.auth
            .get_session()
            .await?
            .map(|session| session.access_token)
            .ok_or(StoreError::NotAuthenticated)
    }
}

#[async_trait]
impl DocumentStore for SupabaseProjectStore {
    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        let Some(session) = self.auth.get_session().await? else {
            return Ok(None);
        };
        Ok(self.supabase.fetch_user(&session.access_token).await?)
    }

    async fn fetch_content(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        let token = self.access_token().await?;
        let path = format!(
            "/rest/v1/{}?select=content&user_id=eq.{}&limit=1",
            self.table,
            urlencoding::encode(user_id)
        );

        let response = self
            .supabase
            .request(Method::GET, &path, Some(token.as_str()))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await.into());
        }

        let rows: Vec<ContentRow> = response.json().await?;
        Ok(rows.into_iter().next().map(|row| row.content))
    }

    async fn upsert(&self, user_id: &str, content: Value) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let path = format!("/rest/v1/{}?on_conflict=user_id", self.table);
        let row = json!({
            "user_id": user_id,
            "content": content,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let response = self
            .supabase
            .request(Method::POST, &path, Some(token.as_str()))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await.into());
        }

        Ok(())
    }
}
