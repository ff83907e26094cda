//! Error types for every remote seam of the client
//!
//! Each collaborator gets its own enum so callers can tell an unreachable service
//! apart from a rejected request. AI backend failures additionally map onto a small
//! set of user-facing notices; quota exhaustion in particular gets its own notice
//! with recharge guidance instead of the generic failure message.

use serde_json::Value;
use thiserror::Error;

/// Where the user can top up the upstream AI provider's balance.
pub const RECHARGE_URL: &str = "https://platform.deepseek.com/usage";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Identity provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("Identity provider unreachable: {0}")]
    Network(String),
    #[error("Identity provider is not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("No active session")]
    NoSession,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No authenticated user")]
    NotAuthenticated,
    #[error("Document store rejected the request ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("Document store unreachable: {0}")]
    Network(String),
    #[error("Project document could not be (de)serialized: {0}")]
    Serialization(String),
    #[error("Auto-save requires a running Tokio runtime")]
    NoRuntime,
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Serialization(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Provider { status, message } => StoreError::Backend { status, message },
            AuthError::Network(message) => StoreError::Network(message),
            AuthError::NoSession => StoreError::NotAuthenticated,
            other => StoreError::Backend {
                status: 0,
                message: other.to_string(),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Insufficient balance on the AI provider: {detail}")]
    InsufficientBalance { detail: String },
    #[error("AI backend unreachable: {0}")]
    Unreachable(String),
    #[error("AI backend returned {status}: {detail}")]
    Upstream { status: u16, detail: String },
    #[error("AI backend reported an error: {message}")]
    BackendReported { message: String },
    #[error("Failed to decode AI backend response: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Unreachable(err.to_string())
        }
    }
}

impl ApiError {
    /// Classifies a non-2xx response from the AI backend.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = error_detail(body).unwrap_or_else(|| body.trim().to_string());

        if status == 402 || mentions_insufficient_balance(&detail) {
            return ApiError::InsufficientBalance { detail };
        }

        ApiError::Upstream { status, detail }
    }

    /// Inspects a 2xx body for the backend's in-band `{"error": ...}` failure shape.
    pub fn from_success_body(body: &Value) -> Option<Self> {
        let message = match body.get("error")? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };

        let raw = body
            .get("raw")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if mentions_insufficient_balance(&message) || mentions_insufficient_balance(raw) {
            return Some(ApiError::InsufficientBalance { detail: message });
        }

        Some(ApiError::BackendReported { message })
    }

    pub fn kind(&self) -> NoticeKind {
        match self {
            ApiError::InsufficientBalance { .. } => NoticeKind::InsufficientBalance,
            ApiError::Unreachable(_) => NoticeKind::NetworkError,
            _ => NoticeKind::Generic,
        }
    }

    /// The message a blocking dialog or inline alert should show for this failure.
    pub fn notice(&self) -> ErrorNotice {
        match self {
            ApiError::InsufficientBalance { .. } => ErrorNotice {
                kind: NoticeKind::InsufficientBalance,
                title: "Insufficient AI balance".to_string(),
                message: "The AI provider has run out of credit. Recharge the account balance and try again.".to_string(),
                action_url: Some(RECHARGE_URL.to_string()),
            },
            ApiError::Unreachable(_) => ErrorNotice {
                kind: NoticeKind::NetworkError,
                title: "Backend unreachable".to_string(),
                message: "Could not connect to the analysis server. Check that it is running and try again.".to_string(),
                action_url: None,
            },
            ApiError::Upstream { detail, .. } if !detail.is_empty() => {
                ErrorNotice::generic(detail.clone())
            }
            ApiError::BackendReported { message } => ErrorNotice::generic(message.clone()),
            ApiError::InvalidRequest(message) => ErrorNotice::generic(message.clone()),
            _ => ErrorNotice::generic(
                "An unexpected error occurred while processing your request.".to_string(),
            ),
        }
    }
}

/// User-facing category of an AI backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum NoticeKind {
    InsufficientBalance,
    NetworkError,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
}

impl ErrorNotice {
    fn generic(message: String) -> Self {
        Self {
            kind: NoticeKind::Generic,
            title: "Something went wrong".to_string(),
            message,
            action_url: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse YAML config: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"].iter().find_map(|key| match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn mentions_insufficient_balance(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("insufficient balance") || lowered.contains("insufficient_balance")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payment_required_maps_to_insufficient_balance() {
        let err = ApiError::from_response(402, r#"{"detail": "Payment Required"}"#);
        assert_eq!(
            err,
            ApiError::InsufficientBalance {
                detail: "Payment Required".to_string()
            }
        );
        let notice = err.notice();
        assert_eq!(notice.kind, NoticeKind::InsufficientBalance);
        assert_eq!(notice.action_url.as_deref(), Some(RECHARGE_URL));
    }

    #[test]
    fn balance_message_in_server_error_is_flagged() {
        let err = ApiError::from_response(500, r#"{"detail": "Error code: 402 - Insufficient Balance"}"#);
        assert_eq!(err.kind(), NoticeKind::InsufficientBalance);
    }

    #[test]
    fn other_statuses_keep_backend_detail() {
        let err = ApiError::from_response(400, r#"{"detail": "El título es obligatorio"}"#);
        assert_eq!(
            err,
            ApiError::Upstream {
                status: 400,
                detail: "El título es obligatorio".to_string()
            }
        );
        let notice = err.notice();
        assert_eq!(notice.kind, NoticeKind::Generic);
        assert_eq!(notice.message, "El título es obligatorio");
    }

    #[test]
    fn non_json_body_is_used_verbatim() {
        let err = ApiError::from_response(503, "  upstream down ");
        assert_eq!(
            err,
            ApiError::Upstream {
                status: 503,
                detail: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn in_band_error_bodies_are_detected() {
        assert_eq!(ApiError::from_success_body(&json!({"score": 8})), None);
        assert_eq!(
            ApiError::from_success_body(&json!({"error": "Error al procesar", "raw": "..."})),
            Some(ApiError::BackendReported {
                message: "Error al procesar".to_string()
            })
        );
        assert_eq!(
            ApiError::from_success_body(&json!({"error": "failed", "raw": "Insufficient Balance"}))
                .map(|e| e.kind()),
            Some(NoticeKind::InsufficientBalance)
        );
    }

    #[test]
    fn unreachable_gets_network_notice() {
        let notice = ApiError::Unreachable("connection refused".to_string()).notice();
        assert_eq!(notice.kind, NoticeKind::NetworkError);
        assert_eq!(notice.action_url, None);
    }

    #[test]
    fn auth_errors_convert_to_store_errors() {
        let err: StoreError = AuthError::Network("timeout".to_string()).into();
        assert_eq!(err, StoreError::Network("timeout".to_string()));
    }
}
