//! Client-side core of the ThesIA thesis assistant.
//!
//! The crate owns the two application stores and the navigation gate that sits in
//! front of the dashboard:
//!
//! - **Session store**: the single source of truth for "is a user signed in",
//!   kept current by the identity provider's change notifications
//! - **Project store**: the user's thesis fields and the latest AI results, loaded
//!   from and auto-saved to a remote document store on a trailing debounce
//! - **Route guard**: renders the dashboard only for an authenticated session
//!
//! Remote collaborators (identity provider, document store, AI backend) are traits
//! in [`providers`]; HTTP implementations live in `thesia-client`.

pub mod actions;
pub mod config;
pub mod debounce;
pub mod errors;
pub mod models;
pub mod project_store;
pub mod providers;
pub mod routing;
pub mod session_store;

pub use actions::Dashboard;
pub use config::{ConfigLoader, FetchPolicy, ThesiaConfig};
pub use debounce::Debouncer;
pub use errors::{ApiError, AuthError, ConfigError, ErrorNotice, NoticeKind, StoreError};
pub use models::*;
pub use project_store::{FetchOutcome, ProjectState, ProjectStore, ProjectStoreOptions, SaveOutcome};
pub use providers::{AiBackend, DocumentStore, IdentityProvider};
pub use routing::{GuardDecision, Route, RouteGuard, Router};
pub use session_store::{SessionState, SessionStore, SessionStoreOptions};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
