//! Configuration module
//!
//! Contains application settings loaded from environment variables.

pub mod settings;

pub use settings::{ApiKeyConfig, Environment, RateLimitConfig, Settings};
