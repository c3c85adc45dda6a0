//! Application state container
//!
//! Shared application state passed to all request handlers via Axum's
//! state extraction. Process-wide resources (the key store, the rate
//! limiter window map, the logger) are constructed once here and
//! injected, never imported as globals.

use crate::config::Settings;
use crate::keys::{KeyStore, MemoryKeyStore};
use crate::logging::Logger;
use crate::middleware::auth::AuthState;
use crate::ratelimit::FixedWindowLimiter;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
///
/// Cheaply cloneable (via Arc) and thread-safe.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Durable store of issued API keys
    pub key_store: Arc<dyn KeyStore>,

    /// Per-key fixed-window request counters
    pub limiter: Arc<FixedWindowLimiter>,

    /// Structured request logger
    pub logger: Logger,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create application state with the default in-memory key store
    pub fn new(settings: Settings, logger: Logger) -> Self {
        let store = MemoryKeyStore::shared();
        Self::with_store(settings, logger, store)
    }

    /// Create application state backed by an explicit key store
    pub fn with_store(
        settings: Settings,
        logger: Logger,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        let settings = Arc::new(settings);
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(
            settings.rate_limit.window_seconds,
        )));

        Self {
            settings,
            key_store,
            limiter,
            logger,
            start_time: Instant::now(),
        }
    }

    /// State slice consumed by the authentication middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            settings: Arc::clone(&self.settings),
            key_store: Arc::clone(&self.key_store),
            limiter: Arc::clone(&self.limiter),
            logger: self.logger.clone(),
        }
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
