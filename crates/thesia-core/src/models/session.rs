use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: UserMetadata,
}

impl User {
    pub fn display_name(&self) -> Option<&str> {
        self.metadata
            .full_name
            .as_deref()
            .or(self.metadata.name.as_deref())
            .or(self.email.as_deref())
    }
}

/// Identity record issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn new(access_token: impl Into<String>, user: User) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            user,
        }
    }

    /// `None` when the lifetime does not fit a timestamp.
    pub fn expiry_after(expires_in_secs: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        TimeDelta::try_seconds(expires_in_secs).and_then(|lifetime| now.checked_add_signed(lifetime))
    }

    pub fn with_expiry(mut self, expires_in_secs: i64, now: DateTime<Utc>) -> Option<Self> {
        self.expires_at = Some(Self::expiry_after(expires_in_secs, now)?);
        Some(self)
    }

    /// Sessions without an expiry never expire locally.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    #[default]
    Google,
    Github,
    Azure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A notification pushed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_deserializes_provider_metadata() {
        let user: User = serde_json::from_value(json!({
            "id": "u-1",
            "email": "ana@uni.edu",
            "user_metadata": {"full_name": "Ana Torres", "avatar_url": "https://img/a.png"},
            "aud": "authenticated"
        }))
        .unwrap();

        assert_eq!(user.display_name(), Some("Ana Torres"));
        assert_eq!(user.metadata.avatar_url.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let user = User {
            id: "u-2".to_string(),
            email: Some("b@uni.edu".to_string()),
            metadata: UserMetadata::default(),
        };
        assert_eq!(user.display_name(), Some("b@uni.edu"));
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        let user = User {
            id: "u".to_string(),
            email: None,
            metadata: UserMetadata::default(),
        };
        let session = Session::new("tok", user).with_expiry(60, now).unwrap();
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + TimeDelta::seconds(61)));
    }

    #[test]
    fn out_of_range_lifetime_has_no_expiry() {
        let now = Utc::now();
        let user = User {
            id: "u".to_string(),
            email: None,
            metadata: UserMetadata::default(),
        };
        assert_eq!(Session::expiry_after(i64::MAX, now), None);
        assert_eq!(Session::expiry_after(i64::MIN, now), None);
        // Fits a TimeDelta but lands past the last representable date.
        assert_eq!(Session::expiry_after(i64::MAX / 1000, now), None);
        assert!(Session::new("tok", user).with_expiry(i64::MAX, now).is_none());
    }

    #[test]
    fn provider_names_are_lowercase() {
        assert_eq!(OAuthProvider::Google.to_string(), "google");
        assert_eq!("github".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert_eq!(AuthEvent::TokenRefreshed.to_string(), "TOKEN_REFRESHED");
    }
}
