//! Per-key rate limiting
//!
//! Fixed-window counters keyed by a key's secret hash. A window admits
//! `quota` requests, then resets at a fixed boundary; this deliberately
//! trades smoothness for O(1) memory and check cost. Known limitation:
//! a client can burst up to ~2x quota across a window boundary. That is
//! accepted; do not convert this to a sliding window without revisiting
//! the configured quota numbers.
//!
//! State is process-local and lost on restart; the limiter is a soft
//! anti-abuse control, not a correctness guarantee.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Evict long-dead windows every this many checks
const SWEEP_INTERVAL: u64 = 256;

/// Keep expired windows around for this many window lengths before sweeping
const SWEEP_GRACE_WINDOWS: u64 = 5;

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Window reset time, epoch milliseconds
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Window reset as unix seconds, for the `X-RateLimit-Reset` header
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }

    /// Whole seconds until the window resets, at least 1
    pub fn retry_after_secs(&self) -> u64 {
        let now = now_ms();
        self.reset_at_ms.saturating_sub(now).div_ceil(1000).max(1)
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at_ms: u64,
}

/// In-memory fixed-window request counter.
///
/// The window map is the only shared mutable process-wide state in the
/// pipeline; the read-increment-write sequence is guarded by a mutex so
/// concurrent requests for the same key cannot lose increments.
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    checks: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            checks: AtomicU64::new(0),
        }
    }

    /// Count one request against `limiter_key` with the given quota.
    ///
    /// A quota of zero always denies.
    pub fn check(&self, limiter_key: &str, quota: u32) -> RateLimitDecision {
        self.check_at(limiter_key, quota, now_ms())
    }

    fn check_at(&self, limiter_key: &str, quota: u32, now_ms: u64) -> RateLimitDecision {
        let window_ms = self.window.as_millis() as u64;

        let mut windows = self.windows.lock().expect("rate limit window map");

        // Opportunistic housekeeping: deleted keys would otherwise leak
        // windows forever.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == 0 {
            let cutoff = now_ms.saturating_sub(SWEEP_GRACE_WINDOWS * window_ms);
            windows.retain(|_, w| w.reset_at_ms >= cutoff);
        }

        if quota == 0 {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at_ms: now_ms + window_ms,
            };
        }

        match windows.get_mut(limiter_key) {
            // A window is valid only while now <= reset; once expired it
            // is replaced, never incremented.
            Some(window) if now_ms <= window.reset_at_ms => {
                window.count += 1;
                RateLimitDecision {
                    allowed: window.count <= quota,
                    remaining: quota.saturating_sub(window.count),
                    reset_at_ms: window.reset_at_ms,
                }
            }
            _ => {
                let reset_at_ms = now_ms + window_ms;
                windows.insert(
                    limiter_key.to_string(),
                    Window {
                        count: 1,
                        reset_at_ms,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: quota.saturating_sub(1),
                    reset_at_ms,
                }
            }
        }
    }

    /// Number of live windows (observability / tests)
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().expect("rate limit window map").len()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
