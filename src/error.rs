use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::blob_store::BlobError;

/// Top-level failures that abort a request.
///
/// Anything that goes wrong for a single file or style is recorded in the
/// [`ProcessingOutcome`](crate::outcome::ProcessingOutcome) instead.
#[derive(Debug, Error)]
pub enum StylizerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited { limit: usize, retry_after: Duration },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StylizerError>;

impl StylizerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StylizerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StylizerError::NotFound(_) => StatusCode::NOT_FOUND,
            StylizerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            StylizerError::Validation(_) => StatusCode::BAD_REQUEST,
            StylizerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StylizerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BlobError> for StylizerError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Configuration(msg) => StylizerError::Configuration(msg),
            other => StylizerError::Storage(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for StylizerError {
    fn from(err: validator::ValidationErrors) -> Self {
        StylizerError::Validation(err.to_string())
    }
}

impl IntoResponse for StylizerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let mut response = (status, self.to_string()).into_response();
        if let StylizerError::RateLimited { limit, retry_after } = &self {
            // Round up so clients never retry before a slot frees.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
            headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StylizerError::Configuration("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(StylizerError::NotFound("c".into()).status_code(), StatusCode::NOT_FOUND);
        let limited = StylizerError::RateLimited {
            limit: 100,
            retry_after: Duration::from_secs(3),
        };
        assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(StylizerError::Validation("v".into()).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rate_limited_headers() {
        let response = StylizerError::RateLimited {
            limit: 100,
            retry_after: Duration::from_millis(2500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
    }

    #[test]
    fn test_blob_configuration_error_stays_configuration() {
        let err: StylizerError = BlobError::Configuration("missing AccountName".into()).into();
        assert!(matches!(err, StylizerError::Configuration(_)));

        let err: StylizerError = BlobError::Backend("timeout".into()).into();
        assert!(matches!(err, StylizerError::Storage(_)));
    }
}
