use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

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
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// The backend answers failures with `{"message": ...}` or `{"error": ...}`.
    /// Prefer that text, then the raw body, then a generic message.
    fn server_message(status: reqwest::StatusCode, body: &str) -> String {
        let from_json = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                ["message", "error"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
            });

        match from_json {
            Some(message) => message,
            None if !body.trim().is_empty() => Self::truncate_body(body.trim()),
            None => format!("Request failed with status {}", status),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::server_message(status, body);
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// True for failures that mean the token is missing, expired or rejected
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::AccessDenied(_))
    }

    /// Whether an `ApiError` auth failure sits anywhere in the context chain
    pub fn is_auth_error(err: &anyhow::Error) -> bool {
        err.chain()
            .filter_map(|cause| cause.downcast_ref::<ApiError>())
            .any(ApiError::is_auth_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_prefers_server_message() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message": "token expired"}"#);
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "token expired"));
        assert!(err.is_auth_failure());

        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"error": "Weight must be between 0 and 999.999 kg"}"#,
        );
        assert_eq!(
            err.to_string(),
            "Invalid request: Weight must be between 0 and 999.999 kg"
        );
    }

    #[test]
    fn test_from_status_generic_message_for_empty_body() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(
            err.to_string(),
            "Server error: Request failed with status 500 Internal Server Error"
        );
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_auth_error_found_behind_context() {
        let err = anyhow::Error::from(ApiError::Unauthorized("token expired".to_string()))
            .context("Failed to fetch catch log");
        assert!(ApiError::is_auth_error(&err));

        let err = anyhow::Error::from(ApiError::NotFound("404".to_string()));
        assert!(!ApiError::is_auth_error(&err));
        assert!(!ApiError::is_auth_error(&anyhow::anyhow!("timed out")));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let err = ApiError::from_status(StatusCode::NOT_FOUND, &body);
        let message = err.to_string();
        assert!(message.contains("truncated, 2000 total bytes"));
        assert!(message.len() < 600);
    }
}
