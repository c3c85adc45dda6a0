//! Application settings and configuration
//!
//! This module provides configuration management for the application,
//! loading settings from environment variables with sensible defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!(
                "Invalid environment: {}. Expected: development, staging, or production",
                s
            ),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Quota applied when a key record carries no usable limit
    pub default_requests_per_minute: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_requests_per_minute: 60,
            window_seconds: 60,
        }
    }
}

/// API key issuance defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    /// Maximum number of keys a single owner may hold
    pub max_keys_per_owner: usize,
    /// Scopes granted to newly issued user keys
    pub default_permissions: Vec<String>,
    /// Requests-per-minute quota for newly issued user keys
    pub default_rate_limit: u32,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            max_keys_per_owner: 5,
            default_permissions: vec![
                "read:events".to_string(),
                "read:registrations".to_string(),
                "read:analytics".to_string(),
                "read:tickets".to_string(),
            ],
            default_rate_limit: 60,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    // Authentication
    pub require_api_key: bool,

    // Rate limiting
    pub rate_limit: RateLimitConfig,

    // Key issuance
    pub api_keys: ApiKeyConfig,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self {
            // App settings
            app_name: env_or_default("APP_NAME", "maketicket-api"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            // Server settings
            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "8000")
                .parse()
                .context("Invalid PORT value")?,

            // Authentication
            require_api_key: env_or_default("REQUIRE_API_KEY", "true")
                .parse()
                .unwrap_or(true),

            // Rate limiting
            rate_limit: RateLimitConfig {
                enabled: env_or_default("RATE_LIMIT_ENABLED", "true")
                    .parse()
                    .unwrap_or(true),
                default_requests_per_minute: env_or_default("RATE_LIMIT_DEFAULT_PER_MINUTE", "60")
                    .parse()
                    .unwrap_or(60),
                window_seconds: env_or_default("RATE_LIMIT_WINDOW_SECONDS", "60")
                    .parse()
                    .unwrap_or(60),
            },

            // Key issuance
            api_keys: ApiKeyConfig {
                max_keys_per_owner: env_or_default("API_KEYS_MAX_PER_OWNER", "5")
                    .parse()
                    .unwrap_or(5),
                default_permissions: env::var("API_KEYS_DEFAULT_PERMISSIONS")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|_| ApiKeyConfig::default().default_permissions),
                default_rate_limit: env_or_default("API_KEYS_DEFAULT_RATE_LIMIT", "60")
                    .parse()
                    .unwrap_or(60),
            },
        };

        // Validate settings
        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        // Validate port range
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        // Validate rate limit settings
        if self.rate_limit.enabled && self.rate_limit.window_seconds == 0 {
            anyhow::bail!("Rate limit window_seconds must be > 0");
        }

        if self.api_keys.max_keys_per_owner == 0 {
            anyhow::bail!("API key max_keys_per_owner must be > 0");
        }

        // Warn if no API key auth in production
        if self.environment == Environment::Production && !self.require_api_key {
            tracing::warn!("Running in production without API key authentication!");
        }

        Ok(())
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "maketicket-api".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            require_api_key: true,
            rate_limit: RateLimitConfig::default(),
            api_keys: ApiKeyConfig::default(),
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "maketicket-api");
        assert_eq!(settings.port, 8000);
        assert!(settings.require_api_key);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
    }

    #[test]
    fn test_default_key_permissions() {
        let settings = Settings::default();
        assert!(settings
            .api_keys
            .default_permissions
            .contains(&"read:events".to_string()));
        assert_eq!(settings.api_keys.max_keys_per_owner, 5);
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8000");
    }
}
