//! External API endpoints
//!
//! Routes served to API-key holders under `/api/v1`. Handlers consume the
//! verified [`ApiKey`] record the authentication middleware attached to
//! the request; owner-scoped business data (events, tickets, payments)
//! lives in its own services and is out of scope here.

use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::keys::ApiKey;

/// Describe the authenticated key.
///
/// GET /api/v1/key
pub async fn describe_key(Extension(key): Extension<ApiKey>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "id": key.id,
            "name": key.name,
            "key_prefix": key.key_prefix,
            "permissions": key.permissions,
            "rate_limit": key.rate_limit,
            "expires_at": key.expires_at,
            "created_at": key.created_at,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Usage statistics for the authenticated key.
///
/// Gated by `read:analytics`.
///
/// GET /api/v1/usage
pub async fn usage(Extension(key): Extension<ApiKey>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "key_prefix": key.key_prefix,
            "requests": key.usage_count,
            "last_used_at": key.last_used_at,
            "rate_limit": key.rate_limit,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
