use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Status and server-provided message of a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub status: u16,
    /// The `message` field of a JSON error body, when there was one.
    pub message: Option<String>,
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(ref message) => write!(f, "{}", message),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

#[derive(Deserialize)]
struct MessageBody {
    message: Option<String>,
}

impl ErrorBody {
    fn parse(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<MessageBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .map(|m| truncate_body(&m));
        Self { status, message }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(ErrorBody),

    #[error("Access denied: {0}")]
    AccessDenied(ErrorBody),

    #[error("Resource not found: {0}")]
    NotFound(ErrorBody),

    #[error("Conflict: {0}")]
    Conflict(ErrorBody),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request rejected: {0}")]
    Rejected(ErrorBody),

    #[error("Server error: {0}")]
    ServerError(ErrorBody),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed = ErrorBody::parse(status.as_u16(), body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(parsed),
            403 => ApiError::AccessDenied(parsed),
            404 => ApiError::NotFound(parsed),
            409 => ApiError::Conflict(parsed),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(parsed),
            _ => ApiError::Rejected(parsed),
        }
    }

    /// Status and message of a non-2xx response.
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Unauthorized(b)
            | ApiError::AccessDenied(b)
            | ApiError::NotFound(b)
            | ApiError::Conflict(b)
            | ApiError::Rejected(b)
            | ApiError::ServerError(b) => Some(b),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited => Some(429),
            other => other.body().map(|b| b.status),
        }
    }

    /// 401 or 403: the session is no longer accepted.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::AccessDenied(_))
    }

    /// The request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::NetworkError(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, ""),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, ""),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, ""),
            ApiError::Rejected(_)
        ));
    }

    #[test]
    fn test_from_status_extracts_message() {
        let err = ApiError::from_status(
            StatusCode::CONFLICT,
            r#"{"success":false,"message":"Email is already registered"}"#,
        );
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.body().and_then(|b| b.message.as_deref()),
            Some("Email is already registered")
        );
        assert_eq!(err.to_string(), "Conflict: Email is already registered");
    }

    #[test]
    fn test_from_status_without_json_message() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.body().and_then(|b| b.message.clone()), None);
        assert_eq!(err.to_string(), "Server error: HTTP 502");
    }

    #[test]
    fn test_classification() {
        assert!(ApiError::from_status(StatusCode::FORBIDDEN, "").is_auth_failure());
        assert!(!ApiError::from_status(StatusCode::NOT_FOUND, "").is_auth_failure());
        assert!(ApiError::Timeout.is_transport());
        assert!(!ApiError::InvalidResponse("x".into()).is_transport());
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
