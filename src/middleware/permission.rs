//! Permission gate
//!
//! Per-route guard checking that the authenticated key's scope list
//! contains a required permission. Pure set membership: no state, no side
//! effects.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::error::AuthError;
use crate::keys::ApiKey;

/// Reject the request unless the authenticated key holds `permission`.
///
/// Must run after [`require_api_key`](crate::middleware::auth::require_api_key);
/// a missing principal is treated as an unauthenticated request.
///
/// ```ignore
/// Router::new()
///     .route("/usage", get(external::usage))
///     .layer(middleware::from_fn(|req, next| {
///         permission::require_permission("read:analytics", req, next)
///     }))
/// ```
pub async fn require_permission(
    permission: &'static str,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(key) = request.extensions().get::<ApiKey>() else {
        return Err(AuthError::MissingKey);
    };

    if !key.has_permission(permission) {
        return Err(AuthError::InsufficientScope {
            required: permission.to_string(),
            available: key.permissions.clone(),
        });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::OwnerKind;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use chrono::Utc;

    fn key_with_permissions(permissions: &[&str]) -> ApiKey {
        ApiKey {
            id: "key-1".to_string(),
            name: "gate-test".to_string(),
            key_prefix: "mt_abcd1234".to_string(),
            hashed_key: "hash".to_string(),
            owner_id: "user-1".to_string(),
            owner_kind: OwnerKind::User,
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
            rate_limit: 60,
            ip_allowlist: vec![],
            usage_count: 0,
            last_used_at: None,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_membership_check() {
        let key = key_with_permissions(&["read:events", "read:tickets"]);
        assert!(key.has_permission("read:tickets"));
        assert!(!key.has_permission("read:analytics"));
    }

    #[test]
    fn test_insufficient_scope_response_lists_scopes() {
        let key = key_with_permissions(&["read:events"]);
        let err = AuthError::InsufficientScope {
            required: "read:analytics".to_string(),
            available: key.permissions.clone(),
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
