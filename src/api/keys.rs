//! API key management endpoints
//!
//! Self-service key lifecycle for platform users: list, create, rename,
//! regenerate, delete, and a usage summary. Mounted under
//! `/internal/keys` and fronted by the platform's session authentication,
//! which injects the acting user as the `X-User-ID` header; this module
//! trusts that header and scopes every operation to it.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::keys::{ApiKey, KeyStore as _, KeyStoreError, NewKey, OwnerKind};
use crate::logging::ErrorInfo;
use crate::server::state::AppState;

/// Header set by the session layer identifying the acting user
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("API key not found")]
    NotFound,

    #[error("API key limit reached. You can have a maximum of {0} API keys.")]
    LimitReached(usize),

    #[error("{0}")]
    Invalid(String),

    #[error("Key store error: {0}")]
    Store(String),
}

impl From<KeyStoreError> for ManagementError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound => ManagementError::NotFound,
            KeyStoreError::Unavailable(msg) => ManagementError::Store(msg),
        }
    }
}

impl IntoResponse for ManagementError {
    fn into_response(self) -> Response {
        let status = match &self {
            ManagementError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ManagementError::NotFound => StatusCode::NOT_FOUND,
            ManagementError::LimitReached(_) | ManagementError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            ManagementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Store detail stays server-side
        let message = match &self {
            ManagementError::Store(_) => "Failed to process API key request".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateKeyRequest {
    #[validate(length(min = 1, max = 100, message = "API key name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameKeyRequest {
    #[validate(length(min = 1, max = 100, message = "API key name is required"))]
    pub name: String,
}

/// Key record as exposed to its owner; never includes the hash
#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub id: String,
    pub name: String,
    pub key_prefix: String,
    pub permissions: Vec<String>,
    pub rate_limit: u32,
    pub is_active: bool,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ApiKey> for ApiKeyView {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id.clone(),
            name: key.name.clone(),
            key_prefix: key.key_prefix.clone(),
            permissions: key.permissions.clone(),
            rate_limit: key.rate_limit,
            is_active: key.is_active,
            usage_count: key.usage_count,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}

fn acting_user(headers: &HeaderMap) -> Result<String, ManagementError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or(ManagementError::Unauthenticated)
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's keys, newest first.
///
/// GET /internal/keys
pub async fn list_keys(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ManagementError> {
    let owner_id = acting_user(&headers)?;
    let keys = state.key_store.list_for_owner(&owner_id).await?;

    Ok(Json(json!({
        "api_keys": keys.iter().map(ApiKeyView::from).collect::<Vec<_>>(),
    })))
}

/// Issue a new key. The plaintext appears in this response only.
///
/// POST /internal/keys
pub async fn create_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateKeyRequest>,
) -> Result<Response, ManagementError> {
    let owner_id = acting_user(&headers)?;
    payload
        .validate()
        .map_err(|e| ManagementError::Invalid(e.to_string()))?;

    let existing = state.key_store.list_for_owner(&owner_id).await?;
    let cap = state.settings.api_keys.max_keys_per_owner;
    if existing.len() >= cap {
        return Err(ManagementError::LimitReached(cap));
    }

    let (record, plaintext) = state
        .key_store
        .create(NewKey {
            name: payload.name,
            owner_id: owner_id.clone(),
            owner_kind: OwnerKind::User,
            permissions: state.settings.api_keys.default_permissions.clone(),
            rate_limit: state.settings.api_keys.default_rate_limit,
            ip_allowlist: vec![],
            expires_at: None,
        })
        .await?;

    state.logger.info(
        "api_key.user_created",
        json!({
            "owner_id": owner_id,
            "key_prefix": record.key_prefix,
            "name": record.name,
        }),
    );

    let body = Json(json!({
        "message": "API key created successfully",
        "api_key": {
            "id": record.id,
            "name": record.name,
            "key": plaintext,
            "key_prefix": record.key_prefix,
            "permissions": record.permissions,
            "rate_limit": record.rate_limit,
            "created_at": record.created_at,
        },
        "warning": "Save this API key securely. It will not be shown again!",
    }));

    Ok((StatusCode::CREATED, body).into_response())
}

/// Rename a key.
///
/// PATCH /internal/keys/:id
pub async fn rename_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key_id): Path<String>,
    Json(payload): Json<RenameKeyRequest>,
) -> Result<Json<serde_json::Value>, ManagementError> {
    let owner_id = acting_user(&headers)?;
    payload
        .validate()
        .map_err(|e| ManagementError::Invalid(e.to_string()))?;

    let record = state
        .key_store
        .rename(&key_id, &owner_id, &payload.name)
        .await?;

    Ok(Json(json!({
        "message": "API key updated successfully",
        "api_key": ApiKeyView::from(&record),
    })))
}

/// Rotate a key's secret. The old plaintext stops working immediately and
/// usage restarts from zero.
///
/// POST /internal/keys/:id/regenerate
pub async fn regenerate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key_id): Path<String>,
) -> Result<Json<serde_json::Value>, ManagementError> {
    let owner_id = acting_user(&headers)?;

    let (record, plaintext) = state.key_store.regenerate(&key_id, &owner_id).await?;

    state.logger.info(
        "api_key.user_regenerated",
        json!({
            "owner_id": owner_id,
            "key_prefix": record.key_prefix,
        }),
    );

    Ok(Json(json!({
        "message": "API key regenerated successfully",
        "api_key": {
            "id": record.id,
            "name": record.name,
            "key": plaintext,
            "key_prefix": record.key_prefix,
        },
        "warning": "Your old API key is now invalid. Save this new key securely!",
    })))
}

/// Destroy a key.
///
/// DELETE /internal/keys/:id
pub async fn delete_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key_id): Path<String>,
) -> Result<Json<serde_json::Value>, ManagementError> {
    let owner_id = acting_user(&headers)?;

    state.key_store.delete(&key_id, &owner_id).await?;

    state.logger.info(
        "api_key.user_deleted",
        json!({"owner_id": owner_id, "key_id": key_id}),
    );

    Ok(Json(json!({ "message": "API key deleted successfully" })))
}

/// Aggregate usage across the caller's keys.
///
/// GET /internal/keys/usage
pub async fn usage_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ManagementError> {
    let owner_id = acting_user(&headers)?;

    let mut keys = state.key_store.list_for_owner(&owner_id).await.map_err(|err| {
        state.logger.error(
            "api_key.usage_summary_failed",
            ErrorInfo::from_error(&err),
        );
        ManagementError::from(err)
    })?;

    let total_requests: u64 = keys.iter().map(|k| k.usage_count).sum();
    let active_keys = keys.iter().filter(|k| k.is_active).count();
    keys.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));

    Ok(Json(json!({
        "overview": {
            "total_keys": keys.len(),
            "active_keys": active_keys,
            "total_requests": total_requests,
        },
        "keys": keys
            .iter()
            .map(|k| json!({
                "name": k.name,
                "key_prefix": k.key_prefix,
                "requests": k.usage_count,
                "last_used": k.last_used_at,
            }))
            .collect::<Vec<_>>(),
    })))
}
