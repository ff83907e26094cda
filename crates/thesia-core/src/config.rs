//! Configuration loading for the client
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables, then whatever the caller overrides (CLI flags).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::ConfigError;
use crate::models::OAuthProvider;
use crate::routing::Route;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 2000;

/// What a project fetch does when the user edited fields while it was in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// The fetched document replaces local state unconditionally.
    #[default]
    Overwrite,
    /// The fetched document is dropped if any edit happened after the fetch began.
    PreserveLocalEdits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThesiaConfig {
    pub api_base_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub projects_table: String,
    pub autosave_delay_ms: u64,
    pub app_origin: String,
    pub oauth_provider: OAuthProvider,
    pub session_file: Option<PathBuf>,
    pub fetch_policy: FetchPolicy,
}

impl Default for ThesiaConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            projects_table: "projects".to_string(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            app_origin: "http://localhost:5173".to_string(),
            oauth_provider: OAuthProvider::Google,
            session_file: None,
            fetch_policy: FetchPolicy::Overwrite,
        }
    }
}

impl ThesiaConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Post-authentication landing location handed to the OAuth flow.
    pub fn sign_in_redirect(&self) -> String {
        format!(
            "{}{}",
            self.app_origin.trim_end_matches('/'),
            Route::Dashboard.path()
        )
    }

    /// Session file location, falling back to the user's config directory.
    pub fn session_file_or_default(&self) -> Option<PathBuf> {
        self.session_file
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("thesia").join("session.json")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.api_base_url) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        if !self.supabase_url.is_empty() && !is_http_url(&self.supabase_url) {
            return Err(ConfigError::Invalid(format!(
                "supabase_url must be an http(s) URL, got '{}'",
                self.supabase_url
            )));
        }

        if self.autosave_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_delay_ms must be greater than zero".to_string(),
            ));
        }

        if self.projects_table.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "projects_table cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `path` when it exists, then the process environment.
    pub async fn load(path: Option<&Path>) -> Result<ThesiaConfig, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path).await?,
            Some(path) => {
                log::debug!("Config file {} not found, using defaults", path.display());
                ThesiaConfig::default()
            }
            None => ThesiaConfig::default(),
        };

        Self::apply_env(&mut config);
        config.validate()?;

        log::debug!(
            "Loaded config: api_base_url={}, supabase_url={}, autosave_delay_ms={}",
            config.api_base_url,
            config.supabase_url,
            config.autosave_delay_ms
        );

        Ok(config)
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ThesiaConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<ThesiaConfig, ConfigError> {
        if content.trim().is_empty() {
            return Ok(ThesiaConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn apply_env(config: &mut ThesiaConfig) {
        Self::apply_env_from(config, |key| env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(config: &mut ThesiaConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("THESIA_API_BASE_URL").or_else(|| non_empty("VITE_API_BASE_URL")) {
            config.api_base_url = url;
        }

        if let Some(url) = non_empty("SUPABASE_URL") {
            config.supabase_url = url;
        }

        if let Some(key) = non_empty("SUPABASE_ANON_KEY") {
            config.supabase_anon_key = key;
        }

        if let Some(delay) = non_empty("THESIA_AUTOSAVE_DELAY_MS") {
            match delay.trim().parse::<u64>() {
                Ok(ms) => config.autosave_delay_ms = ms,
                Err(e) => log::warn!("Ignoring THESIA_AUTOSAVE_DELAY_MS='{}': {}", delay, e),
            }
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty())
}
