//! HTTP collaborators for the ThesIA client.
//!
//! - [`ThesisApiClient`]: the AI backend (profile validation, viability,
//!   regulation analysis, chapter drafting, architecture advice)
//! - [`SupabaseAuth`]: OAuth sign-in and session lifecycle against a
//!   Supabase-compatible auth service
//! - [`SupabaseProjectStore`]: one project document per user in a PostgREST table

pub mod api_client;
pub mod supabase;

pub use api_client::ThesisApiClient;
pub use supabase::{Redirector, SupabaseAuth, SupabaseClient, SupabaseProjectStore};
