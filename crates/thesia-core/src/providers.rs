//! Contracts for the remote collaborators the stores depend on.
//!
//! Implementations are injected at startup, so the stores never reach for an
//! ambient client. `thesia-client` provides the HTTP implementations; the
//! `test_utils` module provides in-memory ones.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::{ApiError, AuthError, StoreError};
use crate::models::{
    ArchitectureRequest, AuthStateChange, ChapterReviewRequest, FullChapterRequest,
    OAuthProvider, ProfileRequest, ResourceRequest, Session, StructureRequest, User,
    ViabilityRequest,
};

/// Issues and revokes sessions, and pushes session changes to listeners.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Starts the OAuth redirect flow; `redirect_to` is where the user lands afterwards.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Every receiver sees every subsequent change until it is dropped.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange>;
}

/// Remote storage holding at most one project document per user.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>, StoreError>;

    /// The stored `content` for `user_id`, if a row exists.
    async fn fetch_content(&self, user_id: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the whole row for `user_id`, inserting it when absent. The store
    /// stamps the update time.
    async fn upsert(&self, user_id: &str, content: Value) -> Result<(), StoreError>;
}

/// Stateless request/response endpoints of the AI backend.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn health_check(&self) -> Result<(), ApiError>;

    async fn validate_profile(&self, request: &ProfileRequest) -> Result<Value, ApiError>;

    async fn evaluate_viability(&self, request: &ViabilityRequest) -> Result<Value, ApiError>;

    async fn analyze_regulations(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError>;

    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError>;

    async fn generate_structure(&self, request: &StructureRequest) -> Result<Value, ApiError>;

    async fn review_chapter_one(&self, request: &ChapterReviewRequest) -> Result<Value, ApiError>;

    async fn expand_text(&self, text: &str) -> Result<Value, ApiError>;

    async fn analyze_writing(&self, text: &str) -> Result<Value, ApiError>;

    async fn generate_versions(
        &self,
        context_info: &str,
        style_request: &str,
    ) -> Result<Value, ApiError>;

    async fn generate_full_chapter(&self, request: &FullChapterRequest) -> Result<Value, ApiError>;

    async fn generate_architecture(&self, request: &ArchitectureRequest) -> Result<Value, ApiError>;

    async fn estimate_resources(&self, request: &ResourceRequest) -> Result<Value, ApiError>;
}
