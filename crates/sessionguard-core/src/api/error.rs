use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("CSRF handshake failed: server did not set the {0} cookie")]
    MissingCsrfToken(&'static str),

    #[error("Authentication rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    AuthRejected {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Request failed ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull the server's `detail` field out of an error body, if the body is JSON.
    pub(crate) fn detail_from_body(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .as_ref()
            .and_then(detail_field)
    }

    /// Error for a rejected login or refresh call.
    pub fn auth_rejected(status: StatusCode, body: &[u8]) -> Self {
        ApiError::AuthRejected {
            status,
            detail: Self::detail_from_body(body),
        }
    }

    /// Error for a non-success business response.
    pub fn from_status(status: StatusCode, body: &serde_json::Value) -> Self {
        ApiError::Status {
            status,
            detail: detail_field(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthRejected { status, .. } | ApiError::Status { status, .. } => {
                Some(*status)
            }
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::AuthRejected { detail, .. } | ApiError::Status { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    /// True when the server refused the caller's credentials, either on a
    /// business call or on the refresh/login exchange.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

fn detail_field(body: &serde_json::Value) -> Option<String> {
    match body.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
