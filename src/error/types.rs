//! API error types

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Everything that can reject a request before it reaches a handler.
///
/// The client-caused variants map to stable 4xx responses with a
/// machine-readable code; `InternalLookupFailure` keeps its detail for
/// logs and stays opaque to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API key is required")]
    MissingKey,

    #[error("API key must start with mt_")]
    InvalidFormat,

    #[error("Invalid or expired API key")]
    InvalidOrExpired,

    #[error("IP address not allowed")]
    IpNotAllowed,

    #[error("Rate limit exceeded")]
    RateLimited {
        limit: u32,
        retry_after_secs: u64,
        reset_at_secs: u64,
    },

    #[error("Insufficient permissions")]
    InsufficientScope {
        required: String,
        available: Vec<String>,
    },

    #[error("Authentication lookup failed: {0}")]
    InternalLookupFailure(String),
}

impl AuthError {
    /// Stable machine-readable code for response bodies and log entries
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingKey => "missing_api_key",
            AuthError::InvalidFormat => "invalid_api_key_format",
            AuthError::InvalidOrExpired => "invalid_api_key",
            AuthError::IpNotAllowed => "ip_not_allowed",
            AuthError::RateLimited { .. } => "rate_limit_exceeded",
            AuthError::InsufficientScope { .. } => "insufficient_permissions",
            AuthError::InternalLookupFailure(_) => "authentication_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingKey
            | AuthError::InvalidFormat
            | AuthError::InvalidOrExpired => StatusCode::UNAUTHORIZED,
            AuthError::IpNotAllowed | AuthError::InsufficientScope { .. } => {
                StatusCode::FORBIDDEN
            }
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InternalLookupFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AuthError::MissingKey => json!({
                "success": false,
                "error": code,
                "message": "Please provide an API key via X-API-Key header or api_key query parameter",
            }),
            AuthError::RateLimited {
                limit,
                retry_after_secs,
                ..
            } => json!({
                "success": false,
                "error": code,
                "message": format!("You have exceeded {limit} requests per minute"),
                "retry_after": retry_after_secs,
            }),
            AuthError::InsufficientScope {
                required,
                available,
            } => json!({
                "success": false,
                "error": code,
                "message": format!("This API key does not have '{required}' permission"),
                "required": required,
                "available": available,
            }),
            // Never leak internal detail to the caller
            AuthError::InternalLookupFailure(_) => json!({
                "success": false,
                "error": code,
                "message": "Authentication error",
            }),
            other => json!({
                "success": false,
                "error": code,
                "message": other.to_string(),
            }),
        };

        let mut response = (status, Json(body)).into_response();

        if let AuthError::RateLimited {
            limit,
            retry_after_secs,
            reset_at_secs,
        } = self
        {
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                headers.insert(header::RETRY_AFTER, v);
            }
            insert_header(headers, "x-ratelimit-limit", limit.to_string());
            insert_header(headers, "x-ratelimit-remaining", "0".to_string());
            insert_header(headers, "x-ratelimit-reset", reset_at_secs.to_string());
        }

        response
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: String) {
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(name, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::MissingKey.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidOrExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::IpNotAllowed.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InternalLookupFailure("db down".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_headers() {
        let response = AuthError::RateLimited {
            limit: 60,
            retry_after_secs: 30,
            reset_at_secs: 1_700_000_030,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "30");
        assert_eq!(response.headers()["x-ratelimit-limit"], "60");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000030");
    }

    #[test]
    fn test_internal_failure_is_opaque() {
        let err = AuthError::InternalLookupFailure("postgres: connection refused".to_string());
        assert_eq!(err.code(), "authentication_error");
        // The internal detail stays in the Display impl for logging only
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AuthError::MissingKey.code(), "missing_api_key");
        assert_eq!(
            AuthError::InsufficientScope {
                required: "read:events".to_string(),
                available: vec![],
            }
            .code(),
            "insufficient_permissions"
        );
    }
}
