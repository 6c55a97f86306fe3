//! Request quota over a rolling window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Time source. Injected so window resets can be tested without waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    pub requests_used: u32,
    pub window_start: DateTime<Utc>,
}

/// Counts scoring calls. Owned by a single pipeline; no interior locking.
pub struct QuotaTracker {
    config: QuotaConfig,
    state: QuotaState,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            config,
            state: QuotaState {
                requests_used: 0,
                window_start,
            },
            clock,
        }
    }

    /// Resets the window if it has elapsed, then reports whether another call fits.
    pub fn can_proceed(&mut self) -> bool {
        let now = self.clock.now();
        if now - self.state.window_start > self.config.window {
            self.state.requests_used = 0;
            self.state.window_start = now;
        }
        self.state.requests_used < self.config.max_requests
    }

    pub fn record_use(&mut self) {
        self.state.requests_used = self.state.requests_used.saturating_add(1);
    }

    pub fn remaining(&self) -> u32 {
        self.config
            .max_requests
            .saturating_sub(self.state.requests_used)
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }
}
