//! Uniform API error shape and its classification

use serde::Deserialize;
use thiserror::Error;

/// Code used when the server omits one from its error envelope
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
/// Connection refused, reset, DNS failure and similar
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// The request exceeded the configured timeout
pub const TIMEOUT: &str = "TIMEOUT";
/// The response body could not be decoded
pub const DECODE_ERROR: &str = "DECODE_ERROR";
pub const NOT_FOUND: &str = "NOT_FOUND";

/// How an error should be treated by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or timeout
    Transport,
    /// The id or page does not exist; terminal
    NotFound,
    /// Anything else, including server-side rejections; retried like
    /// transport failures
    Unknown,
}

/// Every gateway failure, normalized to `{code, message}`.
///
/// `status` carries the HTTP status when there was one. It is not part of the
/// wire shape and only feeds [`ApiError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status the error came with
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TIMEOUT, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DECODE_ERROR, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message).with_status(404)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UNKNOWN_ERROR, message)
    }

    /// Build an error from a non-success HTTP response body.
    ///
    /// Falls back to `UNKNOWN_ERROR` when the body is not an error envelope
    /// or the envelope has no code, and to `fallback_message` when it has no
    /// message.
    pub fn from_response(status: u16, body: &str, fallback_message: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error);

        let code = envelope
            .as_ref()
            .and_then(|e| e.code.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        let message = envelope
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback_message.to_string());

        Self::new(code, message).with_status(status)
    }

    /// Classify this error for retry and display decisions
    pub fn kind(&self) -> ErrorKind {
        if self.status == Some(404) || self.code == NOT_FOUND || self.code.ends_with("_NOT_FOUND")
        {
            return ErrorKind::NotFound;
        }
        if self.code == NETWORK_ERROR || self.code == TIMEOUT {
            return ErrorKind::Transport;
        }
        ErrorKind::Unknown
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Everything except not-found may be retried
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::NotFound
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::decode(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ApiError::network(err.to_string())
        } else {
            let error = ApiError::unknown(err.to_string());
            match err.status() {
                Some(status) => error.with_status(status.as_u16()),
                None => error,
            }
        }
    }
}

/// `{"error": {"code": ..., "message": ...}}` as sent by the server.
/// Both inner fields are optional on input.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_code() {
        let body = r#"{"error":{"code":"SESSION_NOT_FOUND","message":"No session 42"}}"#;
        let err = ApiError::from_response(404, body, "Not Found");
        assert_eq!(err.code, "SESSION_NOT_FOUND");
        assert_eq!(err.message, "No session 42");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_missing_code_becomes_unknown_error() {
        let body = r#"{"error":{"message":"boom"}}"#;
        let err = ApiError::from_response(500, body, "Internal Server Error");
        assert_eq!(err.code, UNKNOWN_ERROR);
        assert_eq!(err.message, "boom");
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_non_json_body_uses_fallback_message() {
        let err = ApiError::from_response(502, "<html>bad gateway</html>", "Bad Gateway");
        assert_eq!(err.code, UNKNOWN_ERROR);
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.status, Some(502));
    }

    #[test]
    fn test_plain_404_is_not_found_even_without_code() {
        let err = ApiError::from_response(404, "", "Not Found");
        assert_eq!(err.code, UNKNOWN_ERROR);
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transport_classification() {
        assert_eq!(ApiError::timeout("10s").kind(), ErrorKind::Transport);
        assert_eq!(ApiError::network("refused").kind(), ErrorKind::Transport);
        assert!(ApiError::timeout("10s").is_retryable());
    }

    #[test]
    fn test_server_rejection_is_unknown_and_retryable() {
        let err = ApiError::from_response(
            400,
            r#"{"error":{"code":"VALIDATION_ERROR","message":"age out of range"}}"#,
            "Bad Request",
        );
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ApiError::new("RATE_LIMITED", "slow down");
        assert_eq!(err.to_string(), "RATE_LIMITED: slow down");
    }
}
