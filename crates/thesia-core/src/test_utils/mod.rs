//! In-memory collaborators for exercising the stores without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::errors::{ApiError, AuthError, StoreError};
use crate::models::{
    ArchitectureRequest, AuthEvent, AuthStateChange, ChapterReviewRequest, FullChapterRequest,
    OAuthProvider, ProfileRequest, ResourceRequest, Session, StructureRequest, User, UserMetadata,
    ViabilityRequest,
};
use crate::providers::{AiBackend, DocumentStore, IdentityProvider};

pub fn sample_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: Some(format!("{}@example.edu", id)),
        metadata: UserMetadata {
            full_name: Some(format!("Student {}", id)),
            ..Default::default()
        },
    }
}

pub fn sample_session(user_id: &str) -> Session {
    Session::new(format!("token-{}", user_id), sample_user(user_id))
}

/// Identity provider backed by a session slot and a broadcast channel.
pub struct MemoryIdentityProvider {
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<AuthStateChange>,
    get_session_error: Mutex<Option<AuthError>>,
    sign_in_error: Mutex<Option<AuthError>>,
    sign_out_error: Mutex<Option<AuthError>>,
    get_session_calls: Mutex<usize>,
    sign_in_requests: Mutex<Vec<(OAuthProvider, String)>>,
    sign_out_calls: Mutex<usize>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            changes,
            get_session_error: Mutex::new(None),
            sign_in_error: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            get_session_calls: Mutex::new(0),
            sign_in_requests: Mutex::new(Vec::new()),
            sign_out_calls: Mutex::new(0),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *provider.session.lock().unwrap() = Some(session);
        provider
    }

    pub fn fail_get_session(&self, error: AuthError) {
        *self.get_session_error.lock().unwrap() = Some(error);
    }

    pub fn fail_sign_in(&self, error: AuthError) {
        *self.sign_in_error.lock().unwrap() = Some(error);
    }

    pub fn fail_sign_out(&self, error: AuthError) {
        *self.sign_out_error.lock().unwrap() = Some(error);
    }

    /// Replaces the stored session and notifies every subscriber.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.lock().unwrap() = session.clone();
        let _ = self.changes.send(AuthStateChange::new(event, session));
    }

    pub fn get_session_calls(&self) -> usize {
        *self.get_session_calls.lock().unwrap()
    }

    pub fn sign_in_requests(&self) -> Vec<(OAuthProvider, String)> {
        self.sign_in_requests.lock().unwrap().clone()
    }

    pub fn sign_out_calls(&self) -> usize {
        *self.sign_out_calls.lock().unwrap()
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        *self.get_session_calls.lock().unwrap() += 1;
        if let Some(error) = self.get_session_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        self.sign_in_requests
            .lock()
            .unwrap()
            .push((provider, redirect_to.to_string()));
        match self.sign_in_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.sign_out_calls.lock().unwrap() += 1;
        if let Some(error) = self.sign_out_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.changes.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}

/// Document store keeping one row per user in a map.
pub struct MemoryDocumentStore {
    user: Mutex<Option<User>>,
    rows: Mutex<HashMap<String, StoredRow>>,
    fetch_delay: Mutex<Duration>,
    upsert_delay: Mutex<Duration>,
    fetch_error: Mutex<Option<StoreError>>,
    upsert_error: Mutex<Option<StoreError>>,
    fetch_count: Mutex<usize>,
    upserts: Mutex<Vec<(String, Value)>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            user: Mutex::new(None),
            rows: Mutex::new(HashMap::new()),
            fetch_delay: Mutex::new(Duration::ZERO),
            upsert_delay: Mutex::new(Duration::ZERO),
            fetch_error: Mutex::new(None),
            upsert_error: Mutex::new(None),
            fetch_count: Mutex::new(0),
            upserts: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_in(user_id: &str) -> Self {
        let store = Self::new();
        store.sign_in_as(user_id);
        store
    }

    pub fn sign_in_as(&self, user_id: &str) {
        *self.user.lock().unwrap() = Some(sample_user(user_id));
    }

    pub fn sign_out(&self) {
        *self.user.lock().unwrap() = None;
    }

    /// Seeds a stored row without counting it as an upsert.
    pub fn put(&self, user_id: &str, content: Value) {
        self.rows.lock().unwrap().insert(
            user_id.to_string(),
            StoredRow {
                content,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn content(&self, user_id: &str) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(user_id)
            .map(|row| row.content.clone())
    }

    pub fn row(&self, user_id: &str) -> Option<StoredRow> {
        self.rows.lock().unwrap().get(user_id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Makes every fetch take `delay` (on the Tokio clock) before answering.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    /// Makes every upsert take `delay` before it is stored.
    pub fn set_upsert_delay(&self, delay: Duration) {
        *self.upsert_delay.lock().unwrap() = delay;
    }

    pub fn fail_fetch(&self, error: Option<StoreError>) {
        *self.fetch_error.lock().unwrap() = error;
    }

    pub fn fail_upsert(&self, error: Option<StoreError>) {
        *self.upsert_error.lock().unwrap() = error;
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn upserts(&self) -> Vec<(String, Value)> {
        self.upserts.lock().unwrap().clone()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        Ok(self.user.lock().unwrap().clone())
    }

    async fn fetch_content(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        *self.fetch_count.lock().unwrap() += 1;
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.fetch_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.content(user_id))
    }

    async fn upsert(&self, user_id: &str, content: Value) -> Result<(), StoreError> {
        let delay = *self.upsert_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.upsert_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.upserts
            .lock()
            .unwrap()
            .push((user_id.to_string(), content.clone()));
        self.put(user_id, content);
        Ok(())
    }
}

/// AI backend answering each operation with a scripted result.
///
/// Unscripted operations answer `{"ok": true}`. Every call is recorded with the
/// operation name and the JSON payload it would have sent.
pub struct MockAiBackend {
    responses: Mutex<HashMap<&'static str, Result<Value, ApiError>>>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockAiBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn respond(&self, operation: &'static str, response: Result<Value, ApiError>) {
        self.responses.lock().unwrap().insert(operation, response);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == operation)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    fn answer(&self, operation: &'static str, payload: Value) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), payload));
        self.responses
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .unwrap_or_else(|| Ok(json!({"ok": true})))
    }
}

impl Default for MockAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiBackend for MockAiBackend {
    async fn health_check(&self) -> Result<(), ApiError> {
        self.answer("health_check", Value::Null).map(|_| ())
    }

    async fn validate_profile(&self, request: &ProfileRequest) -> Result<Value, ApiError> {
        self.answer("validate_profile", json!(request))
    }

    async fn evaluate_viability(&self, request: &ViabilityRequest) -> Result<Value, ApiError> {
        self.answer("evaluate_viability", json!(request))
    }

    async fn analyze_regulations(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        self.answer(
            "analyze_regulations",
            json!({"file_name": file_name, "size": bytes.len()}),
        )
    }

    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        self.answer(
            "extract_text",
            json!({"file_name": file_name, "size": bytes.len()}),
        )
    }

    async fn generate_structure(&self, request: &StructureRequest) -> Result<Value, ApiError> {
        self.answer("generate_structure", json!(request))
    }

    async fn review_chapter_one(&self, request: &ChapterReviewRequest) -> Result<Value, ApiError> {
        self.answer("review_chapter_one", json!(request))
    }

    async fn expand_text(&self, text: &str) -> Result<Value, ApiError> {
        self.answer("expand_text", json!({"text": text}))
    }

    async fn analyze_writing(&self, text: &str) -> Result<Value, ApiError> {
        self.answer("analyze_writing", json!({"text": text}))
    }

    async fn generate_versions(
        &self,
        context_info: &str,
        style_request: &str,
    ) -> Result<Value, ApiError> {
        self.answer(
            "generate_versions",
            json!({"context_info": context_info, "style_request": style_request}),
        )
    }

    async fn generate_full_chapter(&self, request: &FullChapterRequest) -> Result<Value, ApiError> {
        self.answer("generate_full_chapter", json!(request))
    }

    async fn generate_architecture(&self, request: &ArchitectureRequest) -> Result<Value, ApiError> {
        self.answer("generate_architecture", json!(request))
    }

    async fn estimate_resources(&self, request: &ResourceRequest) -> Result<Value, ApiError> {
        self.answer("estimate_resources", json!(request))
    }
}
