//! Startup wiring: one session store, one project store and one dashboard per
//! process, built from the loaded configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use thesia_client::{Redirector, SupabaseAuth, SupabaseClient, SupabaseProjectStore, ThesisApiClient};
use thesia_core::errors::AuthError;
use thesia_core::{
    Dashboard, FetchOutcome, GuardDecision, ProjectStore, ProjectStoreOptions, Route, Router,
    SessionStore, SessionStoreOptions, ThesiaConfig,
};

/// Prints the consent URL; the browser round trip ends with `thesia callback`.
pub struct TerminalRedirector;

impl Redirector for TerminalRedirector {
    fn redirect(&self, url: &str) -> Result<(), AuthError> {
        println!("Open this URL in your browser to sign in:\n\n  {}\n", url);
        println!("After signing in, copy the address of the page you land on and run:\n\n  thesia callback '<URL>'\n");
        Ok(())
    }
}

pub struct App {
    pub config: ThesiaConfig,
    pub auth: Arc<SupabaseAuth>,
    pub session: SessionStore,
    pub project: Arc<ProjectStore>,
    pub dashboard: Dashboard,
    pub router: Router,
}

impl App {
    pub fn build(config: ThesiaConfig) -> Result<Self> {
        let supabase = SupabaseClient::from_config(&config)
            .context("Sign-in needs a Supabase project; set SUPABASE_URL and SUPABASE_ANON_KEY")?;

        let mut auth = SupabaseAuth::new(supabase.clone(), Arc::new(TerminalRedirector));
        if let Some(path) = config.session_file_or_default() {
            auth = auth.with_session_file(path);
        }
        let auth = Arc::new(auth);

        let session = SessionStore::new(auth.clone(), SessionStoreOptions::from_config(&config));
        let documents = Arc::new(SupabaseProjectStore::new(
            supabase,
            auth.clone(),
            config.projects_table.clone(),
        ));
        let project = ProjectStore::new(documents, ProjectStoreOptions::from_config(&config))?;
        let dashboard = Dashboard::new(
            Arc::new(ThesisApiClient::from_config(&config)),
            project.clone(),
        );

        Ok(Self {
            config,
            auth,
            session,
            project,
            dashboard,
            router: Router::new(Route::Landing),
        })
    }

    /// Navigates to the dashboard behind the route guard and loads the project.
    ///
    /// Returns `false` when the guard sent the user back to the landing page.
    pub async fn open_dashboard(&mut self) -> Result<bool> {
        self.session.initialize().await;

        let mut session = self.session.subscribe();
        match self
            .router
            .navigate_guarded(Route::Dashboard, &mut session)
            .await
        {
            GuardDecision::Render => {}
            GuardDecision::Redirect { to, .. } => {
                println!("Not signed in (redirected to {}). Run `thesia login` first.", to);
                return Ok(false);
            }
            GuardDecision::Loading => {
                anyhow::bail!("session check did not complete");
            }
        }

        match self.project.fetch_project().await {
            FetchOutcome::Loaded | FetchOutcome::Missing => Ok(true),
            FetchOutcome::Discarded => {
                log::warn!("Stored project was discarded in favour of local edits");
                Ok(true)
            }
            // Continuing would auto-save an empty document over the stored one.
            FetchOutcome::Failed => anyhow::bail!("could not load the saved project"),
        }
    }

    /// Sends any edit still waiting on the auto-save timer.
    pub async fn finish(&self) {
        if self.project.flush().await {
            log::debug!("Flushed pending auto-save");
        }
    }
}
