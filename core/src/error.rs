//! Error types for the loan API client.
//!
//! # Design
//! Every failure a caller can observe is one of the `ApiError` variants, and
//! `ApiError::kind` flattens them into the `ErrorKind` taxonomy that screens
//! branch on ("offline" vs "slow connection" vs "log in again"). HTTP
//! failures carry the status code and whatever body the server sent, parsed
//! as JSON when possible so validation messages can be shown verbatim.

use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Flat classification of an `ApiError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Auth,
    Client,
    Server,
    MalformedResponse,
    Decode,
    Serialization,
    Storage,
    Config,
}

/// Errors returned by `ApiClient` and its collaborators.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never reached the server or the response never arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The request was aborted after exceeding its timeout.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// 401/403. The stored token has already been cleared.
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },

    /// Any other 4xx, usually server-side validation.
    #[error("request rejected (HTTP {status}): {message}")]
    Client {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },

    /// 5xx.
    #[error("server error (HTTP {status}): {message}")]
    Server {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },

    /// 2xx whose body is not the JSON the endpoint promises, or a status
    /// outside 2xx/4xx/5xx.
    #[error("malformed response (HTTP {status}): {reason}")]
    MalformedResponse {
        status: u16,
        reason: String,
        body: String,
    },

    /// Valid JSON that does not match the endpoint's schema.
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The token store could not be read or written.
    #[error("token storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::Serialization(_) => ErrorKind::Serialization,
            ApiError::Storage(_) => ErrorKind::Storage,
            ApiError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. }
            | ApiError::Client { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw server payload, when the error body was JSON.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::Auth { payload, .. }
            | ApiError::Client { payload, .. }
            | ApiError::Server { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// The message prefers the server's own `detail`/`error`/`message`
    /// field, then the raw body, then the bare status.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<serde_json::Value>(body).ok();
        let message = payload
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.to_string()
                }
            });
        match status {
            401 | 403 => ApiError::Auth {
                status,
                message,
                payload,
            },
            400..=499 => ApiError::Client {
                status,
                message,
                payload,
            },
            500..=599 => ApiError::Server {
                status,
                message,
                payload,
            },
            // 1xx, unfollowed 3xx and anything out of range.
            _ => ApiError::MalformedResponse {
                status,
                reason: format!("unexpected HTTP status {status}"),
                body: body.to_string(),
            },
        }
    }
}

fn server_message(payload: &serde_json::Value) -> Option<String> {
    ["detail", "error", "message"]
        .iter()
        .find_map(|field| payload.get(field).and_then(|v| v.as_str()))
        .map(str::to_string)
}

impl From<std::io::Error> for ApiError {
    fn from(value: std::io::Error) -> Self {
        ApiError::Storage(value.to_string())
    }
}
