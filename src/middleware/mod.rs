//! HTTP middleware
//!
//! The request pipeline: context propagation, API key authentication,
//! and permission gating.

pub mod auth;
pub mod context;
pub mod permission;

pub use auth::{require_api_key, AuthState};
pub use context::propagate_context;
pub use permission::require_permission;
