//! Project store: local cache of one user's thesis project, kept in sync with the
//! remote document store.
//!
//! Every mutation is published to the change listeners. The built-in auto-saver
//! is one of them: while the store is not loading, each document change re-arms a
//! shared [`Debouncer`], so at most one save goes out per quiet period. Fetching
//! sets the loading flag for its whole duration, which keeps the bulk overwrite
//! from scheduling a save of the data that was just loaded. Overlapping fetches
//! share the flag: it clears when the last one finishes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::{FetchPolicy, ThesiaConfig};
use crate::debounce::{DebouncedAction, Debouncer};
use crate::errors::StoreError;
use crate::models::{ProjectDocument, ProjectField};
use crate::providers::DocumentStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub document: ProjectDocument,
    /// Set while a fetch is in flight.
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A stored document replaced local state.
    Loaded,
    /// No signed-in user or no stored document; local state untouched.
    Missing,
    /// An edit happened while the fetch was in flight and the policy kept it.
    Discarded,
    /// The fetch failed; local state untouched.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Nobody is signed in, so there is nowhere to save to.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ProjectStoreOptions {
    /// `None` disables auto-save.
    pub autosave_delay: Option<Duration>,
    pub fetch_policy: FetchPolicy,
}

impl Default for ProjectStoreOptions {
    fn default() -> Self {
        Self {
            autosave_delay: Some(Duration::from_millis(crate::config::DEFAULT_AUTOSAVE_DELAY_MS)),
            fetch_policy: FetchPolicy::Overwrite,
        }
    }
}

impl ProjectStoreOptions {
    pub fn from_config(config: &ThesiaConfig) -> Self {
        Self {
            autosave_delay: Some(config.autosave_delay()),
            fetch_policy: config.fetch_policy,
        }
    }
}

type ChangeListener = Box<dyn Fn(&ProjectState, &ProjectState) + Send + Sync>;

pub struct ProjectStore {
    state: watch::Sender<ProjectState>,
    listeners: Mutex<Vec<ChangeListener>>,
    edit_seq: AtomicU64,
    fetches: AtomicUsize,
    documents: Arc<dyn DocumentStore>,
    fetch_policy: FetchPolicy,
    autosave: Option<Debouncer>,
}

impl ProjectStore {
    /// Builds the store and, when enabled, its auto-save subscription.
    ///
    /// Must be called from within a Tokio runtime when auto-save is enabled.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        options: ProjectStoreOptions,
    ) -> Result<Arc<Self>, StoreError> {
        let runtime = match options.autosave_delay {
            Some(_) => Some(Handle::try_current().map_err(|_| StoreError::NoRuntime)?),
            None => None,
        };

        let store = Arc::new_cyclic(|weak: &Weak<ProjectStore>| {
            let autosave = options
                .autosave_delay
                .zip(runtime)
                .map(|(delay, runtime)| {
                    Debouncer::with_handle(runtime, delay, autosave_action(weak.clone()))
                });

            let (state, _) = watch::channel(ProjectState::default());
            let mut listeners: Vec<ChangeListener> = Vec::new();
            if autosave.is_some() {
                listeners.push(autosave_listener(weak.clone()));
            }

            ProjectStore {
                state,
                listeners: Mutex::new(listeners),
                edit_seq: AtomicU64::new(0),
                fetches: AtomicUsize::new(0),
                documents,
                fetch_policy: options.fetch_policy,
                autosave,
            }
        });

        Ok(store)
    }

    pub fn snapshot(&self) -> ProjectState {
        self.state.borrow().clone()
    }

    pub fn document(&self) -> ProjectDocument {
        self.state.borrow().document.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectState> {
        self.state.subscribe()
    }

    /// Registers a listener called with `(previous, next)` after every change.
    ///
    /// Listeners run synchronously on the mutating task and must not mutate the
    /// store themselves.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&ProjectState, &ProjectState) + Send + Sync + 'static,
    {
        lock(&self.listeners).push(Box::new(listener));
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(move |doc| doc.title = title);
    }

    pub fn set_objective(&self, objective: impl Into<String>) {
        let objective = objective.into();
        self.edit(move |doc| doc.objective = objective);
    }

    pub fn set_variables(&self, variables: impl Into<String>) {
        let variables = variables.into();
        self.edit(move |doc| doc.variables = variables);
    }

    pub fn set_scope(&self, scope: impl Into<String>) {
        let scope = scope.into();
        self.edit(move |doc| doc.scope = scope);
    }

    pub fn set_grade(&self, grade: impl Into<String>) {
        let grade = grade.into();
        self.edit(move |doc| doc.grade = grade);
    }

    pub fn set_area(&self, area: impl Into<String>) {
        let area = area.into();
        self.edit(move |doc| doc.area = area);
    }

    pub fn set_sub_area(&self, sub_area: impl Into<String>) {
        let sub_area = sub_area.into();
        self.edit(move |doc| doc.sub_area = sub_area);
    }

    pub fn set_level(&self, level: impl Into<String>) {
        let level = level.into();
        self.edit(move |doc| doc.level = level);
    }

    pub fn set_profile_validation(&self, validation: Option<Value>) {
        self.edit(move |doc| doc.profile_validation = validation);
    }

    pub fn set_regulation_structure(&self, structure: Option<Value>) {
        self.edit(move |doc| doc.regulation_structure = structure);
    }

    pub fn set_analysis_result(&self, result: Option<Value>) {
        self.edit(move |doc| doc.analysis_result = result);
    }

    pub fn set_field(&self, field: ProjectField, value: impl Into<String>) {
        match field {
            ProjectField::Title => self.set_title(value),
            ProjectField::Objective => self.set_objective(value),
            ProjectField::Variables => self.set_variables(value),
            ProjectField::Scope => self.set_scope(value),
            ProjectField::Grade => self.set_grade(value),
            ProjectField::Area => self.set_area(value),
            ProjectField::SubArea => self.set_sub_area(value),
            ProjectField::Level => self.set_level(value),
        }
    }

    /// Empties every field in one update. The remote copy is only replaced by the
    /// next save.
    pub fn reset(&self) {
        self.edit(|doc| *doc = ProjectDocument::default());
    }

    /// Loads the signed-in user's stored document, replacing every local field.
    ///
    /// Failures are logged and leave local state as it was. The loading flag is
    /// cleared on every exit path, including cancellation of this future.
    pub async fn fetch_project(&self) -> FetchOutcome {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let _loading = LoadingGuard { store: self };
        self.update(|state| state.loading = true);
        let started_at = self.edit_seq.load(Ordering::SeqCst);

        match self.load_remote().await {
            Ok(Some(document)) => {
                let edited = self.edit_seq.load(Ordering::SeqCst) != started_at;
                if edited && self.fetch_policy == FetchPolicy::PreserveLocalEdits {
                    log::warn!("Discarding fetched project: local edits happened during the fetch");
                    return FetchOutcome::Discarded;
                }
                if edited {
                    log::warn!("Fetched project overwrites edits made during the fetch");
                }
                self.update(|state| state.document = document);
                FetchOutcome::Loaded
            }
            Ok(None) => FetchOutcome::Missing,
            Err(e) => {
                log::error!("Error fetching project: {}", e);
                FetchOutcome::Failed
            }
        }
    }

    /// Upserts the current document for the signed-in user.
    pub async fn save_project(&self) -> Result<SaveOutcome, StoreError> {
        let document = self.document();
        let Some(user) = self.documents.current_user().await? else {
            log::debug!("Skipping project save: no signed-in user");
            return Ok(SaveOutcome::Skipped);
        };

        let content = serde_json::to_value(&document)?;
        self.documents.upsert(&user.id, content).await?;
        log::debug!("Saved project for user {}", user.id);

        Ok(SaveOutcome::Saved)
    }

    /// Whether an auto-save is scheduled or still being sent.
    pub fn has_pending_save(&self) -> bool {
        self.autosave
            .as_ref()
            .is_some_and(|debouncer| debouncer.is_armed() || debouncer.is_running())
    }

    /// Runs a scheduled auto-save now and waits for one already being sent.
    /// Returns whether there was either.
    pub async fn flush(&self) -> bool {
        match &self.autosave {
            Some(debouncer) => debouncer.flush().await,
            None => false,
        }
    }

    async fn load_remote(&self) -> Result<Option<ProjectDocument>, StoreError> {
        let Some(user) = self.documents.current_user().await? else {
            log::debug!("No signed-in user, nothing to fetch");
            return Ok(None);
        };

        match self.documents.fetch_content(&user.id).await? {
            Some(content) if !content.is_null() => Ok(Some(serde_json::from_value(content)?)),
            _ => Ok(None),
        }
    }

    fn edit<F>(&self, f: F)
    where
        F: FnOnce(&mut ProjectDocument),
    {
        self.edit_seq.fetch_add(1, Ordering::SeqCst);
        self.update(|state| f(&mut state.document));
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut ProjectState),
    {
        let mut previous = None;
        self.state.send_modify(|state| {
            previous = Some(state.clone());
            f(state);
        });
        let next = self.state.borrow().clone();

        if let Some(previous) = previous {
            for listener in lock(&self.listeners).iter() {
                listener(&previous, &next);
            }
        }
    }
}

struct LoadingGuard<'a> {
    store: &'a ProjectStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.store.fetches.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.store.update(|state| state.loading = false);
        }
    }
}

fn autosave_listener(store: Weak<ProjectStore>) -> ChangeListener {
    Box::new(move |previous, next| {
        if next.loading {
            return;
        }
        if previous.document == next.document {
            return;
        }
        if let Some(store) = store.upgrade() {
            if let Some(debouncer) = &store.autosave {
                debouncer.arm();
            }
        }
    })
}

fn autosave_action(store: Weak<ProjectStore>) -> DebouncedAction {
    Arc::new(move || {
        let store = store.clone();
        Box::pin(async move {
            let Some(store) = store.upgrade() else {
                return;
            };
            if let Err(e) = store.save_project().await {
                log::error!("Auto-save failed: {}", e);
            }
        })
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
