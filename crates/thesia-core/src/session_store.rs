//! Session store: the single source of truth for "is a user signed in".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ThesiaConfig;
use crate::models::{OAuthProvider, Session};
use crate::providers::IdentityProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<Session>,
    /// True until the first session check has resolved.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SessionStoreOptions {
    pub oauth_provider: OAuthProvider,
    pub redirect_to: String,
}

impl SessionStoreOptions {
    pub fn from_config(config: &ThesiaConfig) -> Self {
        Self {
            oauth_provider: config.oauth_provider,
            redirect_to: config.sign_in_redirect(),
        }
    }
}

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    options: SessionStoreOptions,
    state: Arc<watch::Sender<SessionState>>,
    initialized: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, options: SessionStoreOptions) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            provider,
            options,
            state: Arc::new(state),
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves the current session and starts following provider notifications.
    ///
    /// Only the first call has any effect. The listener stays registered for the
    /// lifetime of the store and overwrites the session on every notification.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            log::debug!("Session store already initialized");
            return;
        }

        self.state.send_modify(|state| state.loading = true);

        // Subscribe before the lookup so a change racing with it is not lost.
        let mut changes = self.provider.on_auth_state_change();

        let session = match self.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Error getting session: {}", e);
                None
            }
        };
        self.state.send_replace(SessionState {
            session,
            loading: false,
        });

        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        log::debug!(
                            "Auth state change: {} (signed in: {})",
                            change.event,
                            change.session.is_some()
                        );
                        state.send_replace(SessionState {
                            session: change.session,
                            loading: false,
                        });
                    }
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Session listener skipped {} auth notifications", missed);
                    }
                    Err(RecvError::Closed) => {
                        log::debug!("Identity provider closed its notification channel");
                        break;
                    }
                }
            }
        });

        if let Ok(mut listener) = self.listener.lock() {
            *listener = Some(handle);
        }
    }

    /// Starts the OAuth flow. Failures are logged; the caller stays where it is.
    pub async fn sign_in(&self) {
        if let Err(e) = self
            .provider
            .sign_in_with_oauth(self.options.oauth_provider, &self.options.redirect_to)
            .await
        {
            log::error!("Error signing in: {}", e);
        }
    }

    /// Revokes the session remotely and always clears it locally.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            log::error!("Error signing out: {}", e);
        }
        self.state.send_modify(|state| state.session = None);
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}
