use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401/403. Carries the machine code from the error body when present.
    #[error("Access denied: {message}")]
    Denied {
        message: String,
        code: Option<String>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other 4xx the backend sends back.
    #[error("Request rejected: {message}")]
    Rejected {
        message: String,
        code: Option<String>,
    },

    /// The session changed while the request was in flight. The response
    /// belonged to the previous identity and was discarded.
    #[error("Session changed while the request was in flight")]
    Superseded,
}

/// Error payload the backend attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| Self::truncate_body(body));

        match status.as_u16() {
            401 | 403 => ApiError::Denied { message, code },
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            400..=499 => ApiError::Rejected { message, code },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// The machine code from the error body, when the backend sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Denied { code, .. } | ApiError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
