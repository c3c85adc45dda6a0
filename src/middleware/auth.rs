//! Authentication middleware
//!
//! Turns a raw credential into a verified, quota-checked principal
//! attached to the request, or rejects it with a precise reason. The
//! checks run cheapest-first: presence and key shape before any store
//! I/O, store lookup before the IP and quota checks.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::config::Settings;
use crate::context;
use crate::error::AuthError;
use crate::keys::{generator, ApiKey, KeyStore, OwnerKind};
use crate::logging::{ErrorInfo, Logger};
use crate::middleware::context::client_ip;
use crate::ratelimit::{FixedWindowLimiter, RateLimitDecision};

/// Credential header (preferred transport)
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credential query parameter (fallback transport)
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// State required by the authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub settings: Arc<Settings>,
    pub key_store: Arc<dyn KeyStore>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub logger: Logger,
}

/// Middleware to require API key authentication.
///
/// On success the verified [`ApiKey`] record is inserted into request
/// extensions for the permission gate and handlers, the owner id is
/// merged into the ambient context, and the response carries
/// `X-RateLimit-*` headers.
pub async fn require_api_key(
    State(auth): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    // Escape hatch for local development only; validated settings warn
    // when this is off in production.
    if !auth.settings.require_api_key {
        request.extensions_mut().insert(anonymous_key(&auth.settings));
        return Ok(next.run(request).await);
    }

    // 1. Presence
    let Some(candidate) = extract_credential(&request) else {
        auth.logger.warn("api.key_missing", ());
        return Err(AuthError::MissingKey);
    };

    // 2. Shape check before any lookup cost is paid
    if !generator::has_key_format(&candidate) {
        auth.logger
            .warn("api.invalid_key_format", json!({"length": candidate.len()}));
        return Err(AuthError::InvalidFormat);
    }

    // 3. Lookup & verify by one-way hash
    let hash = generator::hash_key(&candidate);
    let key_prefix = generator::display_prefix(&candidate);

    let record = match auth.key_store.find_active_by_hash(&hash).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            auth.logger
                .warn("api.invalid_key", json!({"key_prefix": key_prefix}));
            return Err(AuthError::InvalidOrExpired);
        }
        Err(err) => {
            auth.logger.error(
                "api.auth_lookup_failed",
                (
                    json!({"key_prefix": key_prefix}),
                    ErrorInfo::from_error(&err),
                ),
            );
            return Err(AuthError::InternalLookupFailure(err.to_string()));
        }
    };

    if record.is_expired(Utc::now()) {
        auth.logger
            .warn("api.expired_key", json!({"key_prefix": record.key_prefix}));
        return Err(AuthError::InvalidOrExpired);
    }

    // 4. IP allow-list
    if !record.ip_allowlist.is_empty() {
        let ip = client_ip(&request);
        let allowed = ip.map(|ip| record.allows_ip(ip)).unwrap_or(false);
        if !allowed {
            auth.logger.warn(
                "api.ip_not_allowed",
                json!({
                    "key_prefix": record.key_prefix,
                    "client_ip": ip.map(|ip| ip.to_string()),
                }),
            );
            return Err(AuthError::IpNotAllowed);
        }
    }

    // 5. Quota, keyed by the secret hash so keys cannot interfere
    let decision = if auth.settings.rate_limit.enabled {
        let decision = auth.limiter.check(&record.hashed_key, record.rate_limit);
        if !decision.allowed {
            auth.logger.warn(
                "api.rate_limit_exceeded",
                json!({
                    "key_prefix": record.key_prefix,
                    "limit": record.rate_limit,
                }),
            );
            return Err(AuthError::RateLimited {
                limit: record.rate_limit,
                retry_after_secs: decision.retry_after_secs(),
                reset_at_secs: decision.reset_at_secs(),
            });
        }
        Some(decision)
    } else {
        None
    };

    // 6. Side effects: ambient user id, usage counters, principal
    context::set_user_id(&record.owner_id);
    spawn_usage_update(&auth, &record);

    auth.logger.debug(
        "api.key_authenticated",
        json!({
            "key_prefix": record.key_prefix,
            "owner_id": record.owner_id,
        }),
    );

    let limit = record.rate_limit;
    request.extensions_mut().insert(record);

    let mut response = next.run(request).await;
    if let Some(decision) = decision {
        add_rate_limit_headers(&mut response, limit, decision);
    }

    Ok(response)
}

/// Extract the credential from the dedicated header or query parameter
fn extract_credential(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }

    request
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// Persist the usage counter off the request path.
///
/// Spawned so a client abort cannot drop the write; usage counts feed
/// quota and billing. Failures are logged and never fail the already
/// authorized request.
fn spawn_usage_update(auth: &AuthState, record: &ApiKey) {
    let store = Arc::clone(&auth.key_store);
    let logger = auth.logger.clone();
    let id = record.id.clone();
    let key_prefix = record.key_prefix.clone();

    tokio::spawn(context::run(context::current(), async move {
        if let Err(err) = store.increment_usage(&id).await {
            logger.warn(
                "api.usage_update_failed",
                (
                    json!({"key_prefix": key_prefix}),
                    ErrorInfo::from_error(&err),
                ),
            );
        }
    }));
}

fn add_rate_limit_headers(response: &mut Response, limit: u32, decision: RateLimitDecision) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at_secs().to_string()),
    ] {
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert(name, v);
        }
    }
}

/// Placeholder principal used when authentication is disabled
fn anonymous_key(settings: &Settings) -> ApiKey {
    ApiKey {
        id: "anonymous".to_string(),
        name: "anonymous".to_string(),
        key_prefix: "mt_disabled".to_string(),
        hashed_key: String::new(),
        owner_id: "anonymous".to_string(),
        owner_kind: OwnerKind::User,
        permissions: settings.api_keys.default_permissions.clone(),
        rate_limit: settings.rate_limit.default_requests_per_minute,
        ip_allowlist: vec![],
        usage_count: 0,
        last_used_at: None,
        is_active: true,
        expires_at: None,
        created_at: Utc::now(),
    }
}
