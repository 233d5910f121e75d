//! API client error types.

use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An upload is already in progress")]
    UploadInProgress,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Map a non-2xx response to an error carrying the server's message.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed { status, message },
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(status, _) => Some(*status),
            Self::RequestFailed { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Transient failures worth another poll.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::ServerError(..) => true,
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Human-readable message, preferring what the server said.
    pub fn server_message(&self) -> String {
        match self {
            Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::RateLimited(m)
            | Self::ServerError(_, m)
            | Self::RequestFailed { message: m, .. } => m.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(ApiError::from_http_status(401, "x"), ApiError::Unauthorized(_)));
        assert!(matches!(ApiError::from_http_status(404, "x"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_http_status(429, "x"), ApiError::RateLimited(_)));
        assert!(matches!(ApiError::from_http_status(503, "x"), ApiError::ServerError(503, _)));
        assert!(matches!(
            ApiError::from_http_status(422, "x"),
            ApiError::RequestFailed { status: 422, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::from_http_status(500, "boom").is_retryable());
        assert!(ApiError::from_http_status(429, "slow down").is_retryable());
        assert!(!ApiError::from_http_status(400, "bad").is_retryable());
        assert!(!ApiError::UploadInProgress.is_retryable());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(ApiError::from_http_status(502, "x").http_status(), Some(502));
        assert_eq!(ApiError::from_http_status(418, "x").http_status(), Some(418));
        assert_eq!(ApiError::config("x").http_status(), None);
    }

    #[test]
    fn test_server_message() {
        let err = ApiError::from_http_status(400, "Title is required");
        assert_eq!(err.server_message(), "Title is required");
        assert_eq!(
            ApiError::UploadInProgress.server_message(),
            "An upload is already in progress"
        );
    }
}
