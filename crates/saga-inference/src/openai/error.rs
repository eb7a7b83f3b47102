//! Classification of OpenAI-compatible HTTP failures.

use saga_core::Error;

/// Error classes reported by OpenAI-compatible servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    /// Rate limit or quota exhausted.
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401 | 403, _) => Self::AuthenticationError,
            (429, _) | (_, "insufficient_quota") => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether re-submitting the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Convert an HTTP failure into a saga error.
///
/// Quota, overload, and unclassified transport-level failures are reported as
/// [`Error::ServiceUnavailable`]. Credential and model problems are
/// configuration errors.
pub fn to_saga_error(code: OpenAIErrorCode, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => {
            Error::InvalidInput(format!("Context too long: {}", message))
        }
        OpenAIErrorCode::RateLimitExceeded => {
            Error::ServiceUnavailable(format!("Rate limit exceeded: {}", message))
        }
        OpenAIErrorCode::ServerError => {
            Error::ServiceUnavailable(format!("Server error: {}", message))
        }
        OpenAIErrorCode::Unknown => Error::ServiceUnavailable(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::ErrorKind;

    #[test]
    fn test_error_code_from_status() {
        assert_eq!(
            OpenAIErrorCode::from_response(401, "invalid_api_key"),
            OpenAIErrorCode::AuthenticationError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(429, "rate_limit_exceeded"),
            OpenAIErrorCode::RateLimitExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(404, "model_not_found"),
            OpenAIErrorCode::ModelNotFound
        );
        assert_eq!(
            OpenAIErrorCode::from_response(503, "overloaded"),
            OpenAIErrorCode::ServerError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(418, "im_a_teapot"),
            OpenAIErrorCode::Unknown
        );
    }

    #[test]
    fn test_quota_by_type() {
        let code = OpenAIErrorCode::from_response(400, "insufficient_quota");
        assert_eq!(code, OpenAIErrorCode::RateLimitExceeded);
        assert!(code.is_retryable());
    }

    #[test]
    fn test_context_length() {
        let code = OpenAIErrorCode::from_response(400, "context_length_exceeded");
        assert_eq!(code, OpenAIErrorCode::ContextLengthExceeded);
        assert!(!code.is_retryable());
    }

    #[test]
    fn test_quota_maps_to_service_unavailable() {
        let err = to_saga_error(OpenAIErrorCode::RateLimitExceeded, "Too many requests");
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(err.to_string().contains("Rate limit exceeded"));
    }

    #[test]
    fn test_server_error_maps_to_service_unavailable() {
        let err = to_saga_error(OpenAIErrorCode::ServerError, "boom");
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn test_auth_is_config_error() {
        let err = to_saga_error(OpenAIErrorCode::AuthenticationError, "Invalid key");
        assert!(matches!(err, Error::Config(_)));
    }
}
