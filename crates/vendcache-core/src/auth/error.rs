use thiserror::Error;

use crate::api::error::ApiError;

/// Machine code the backend attaches to unverified-email rejections.
const EMAIL_NOT_VERIFIED_CODE: &str = "EMAIL_NOT_VERIFIED";

/// Login failure as surfaced to callers.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Could not reach the server")]
    Unreachable,

    #[error("Login rejected: {0}")]
    Rejected(String),

    /// A newer login or logout started while this attempt was in flight.
    /// The attempt's outcome was discarded.
    #[error("Login superseded by a newer attempt")]
    Superseded,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        if err.code() == Some(EMAIL_NOT_VERIFIED_CODE) {
            return AuthError::EmailNotVerified;
        }
        match err {
            ApiError::Denied { .. } => AuthError::InvalidCredentials,
            ApiError::Network(_) => AuthError::Unreachable,
            ApiError::RateLimited => {
                AuthError::Rejected("rate limited, try again shortly".to_string())
            }
            ApiError::NotFound(message)
            | ApiError::ServerError(message)
            | ApiError::InvalidResponse(message) => AuthError::Rejected(message),
            ApiError::Rejected { message, .. } => AuthError::Rejected(message),
            ApiError::Superseded => AuthError::Superseded,
        }
    }
}
