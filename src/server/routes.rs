//! Application routing
//!
//! This module defines all HTTP routes for the application and wires the
//! middleware pipeline: context propagation runs outermost, then
//! authentication, then per-route permission gates.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{external, health, keys};
use crate::middleware::{auth, context as context_middleware, permission};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Health check routes (no authentication required)
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/liveness", get(health::liveness));

    // External API: every route requires a valid API key; analytics
    // additionally requires its scope.
    let gated_usage = Router::new()
        .route("/usage", get(external::usage))
        .layer(middleware::from_fn(|req, next| {
            permission::require_permission("read:analytics", req, next)
        }));

    let external_routes = Router::new()
        .route("/key", get(external::describe_key))
        .merge(gated_usage)
        .layer(middleware::from_fn_with_state(
            state.auth_state(),
            auth::require_api_key,
        ));

    // Key management: fronted by the platform's session auth, which
    // injects X-User-ID; not part of the API-key path.
    let management_routes = Router::new()
        .route("/", get(keys::list_keys).post(keys::create_key))
        .route("/usage", get(keys::usage_summary))
        .route("/:id", patch(keys::rename_key).delete(keys::delete_key))
        .route("/:id/regenerate", post(keys::regenerate_key));

    Router::new()
        .nest("/api/v1", external_routes)
        .nest("/internal/keys", management_routes)
        .merge(health_routes)
        // Layer order: last added = outermost = runs first
        .layer(create_cors_layer())
        .layer(middleware::from_fn_with_state(
            state.logger.clone(),
            context_middleware::propagate_context,
        ))
        .with_state(state)
}

/// CORS layer exposing the correlation and rate limit headers to browsers
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            "x-request-id".parse().unwrap(),
            "x-trace-id".parse().unwrap(),
            "x-ratelimit-limit".parse().unwrap(),
            "x-ratelimit-remaining".parse().unwrap(),
            "x-ratelimit-reset".parse().unwrap(),
            "retry-after".parse().unwrap(),
        ])
}
