//! Collaborator error types.
//!
//! These errors represent failures when talking to the transcription,
//! evaluation, and persistence services. Defined in `bandcheck-core` so the
//! practice engine can classify failures for logging without string matching.

use thiserror::Error;

/// Errors that can occur when calling an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The service returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The service returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The service answered, but not with anything we can use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CollaboratorError {
    /// Returns `true` if retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CollaboratorError::AuthenticationFailed(_) | CollaboratorError::InvalidResponse(_)
        )
    }
}
