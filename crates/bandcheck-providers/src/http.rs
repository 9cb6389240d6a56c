//! Shared HTTP plumbing for the API-backed collaborators.

use std::time::Duration;

use anyhow::{Context, Result};
use bandcheck_core::error::CollaboratorError;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// Map a transport-level failure.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout(timeout_secs)
    } else {
        CollaboratorError::NetworkError(e.to_string())
    }
}

/// Turn non-success statuses into typed errors; pass the response through otherwise.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok());
        return Err(CollaboratorError::RateLimited {
            retry_after_ms: retry_after_ms(retry_after),
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::AuthenticationFailed(body));
    }
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(CollaboratorError::ApiError {
            status,
            message: body,
        });
    }
    Ok(response)
}

/// Seconds from a `retry-after` header, in milliseconds. Defaults to 5s.
fn retry_after_ms(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(5)
        .saturating_mul(1000)
}
