// Sliding-window rate limiter
// One window of request timestamps per identifier, pruned then
// appended in a single synchronous step. State is process-local and
// volatile; a restart resets every budget. Best-effort, not a quota.

use std::collections::HashMap;

use tracing::debug;

/// Defaults match the risk service's own limiter: 100 requests/hour
pub const DEFAULT_MAX_REQUESTS: usize = 100;
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

pub struct RateLimiter {
    max_requests: usize,
    window_secs: i64,
    windows: HashMap<String, Vec<i64>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: i64) -> Self {
        Self {
            max_requests,
            window_secs,
            windows: HashMap::new(),
        }
    }

    /// Try to claim a slot for this identifier at time `now`.
    /// Prune-then-append happens atomically within this call; callers
    /// must not suspend between deciding to acquire and calling this.
    pub fn try_acquire(&mut self, identifier: &str, now: i64) -> bool {
        let window = self.windows.entry(identifier.to_string()).or_default();
        window.retain(|t| now - *t < self.window_secs);

        if window.len() >= self.max_requests {
            debug!("rate limit hit for {}", identifier);
            return false;
        }
        window.push(now);
        true
    }

    /// Remaining budget for an identifier without consuming a slot
    pub fn remaining(&self, identifier: &str, now: i64) -> usize {
        let used = self
            .windows
            .get(identifier)
            .map(|w| w.iter().filter(|t| now - **t < self.window_secs).count())
            .unwrap_or(0);
        self.max_requests.saturating_sub(used)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS)
    }
}
