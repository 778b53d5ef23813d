//! Fixed-window rate limiter shared by every worker slot.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use dlhub_core::config::WorkerConfig;

/// Allows at most `max` acquisitions per `window`, across all callers.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    /// Window state.
    state: Mutex<WindowState>,
    /// Acquisitions allowed per window.
    max: u32,
    /// Window length.
    window: Duration,
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    used: u32,
}

impl FixedWindowLimiter {
    /// Creates a limiter allowing `max` acquisitions per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            state: Mutex::new(WindowState {
                started: Instant::now(),
                used: 0,
            }),
            max: max.max(1),
            window,
        }
    }

    /// Creates the dequeue limiter from worker configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.rate_limit_max, config.rate_limit_window())
    }

    /// Takes a slot in the current window if one is free.
    pub async fn try_acquire(&self) -> bool {
        self.reserve().await.is_ok()
    }

    /// Waits until a slot is free, then takes it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.reserve().await {
            tracing::trace!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// `Err` carries the time until the current window closes.
    async fn reserve(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.used = 0;
        }

        if state.used < self.max {
            state.used += 1;
            Ok(())
        } else {
            Err((state.started + self.window).saturating_duration_since(now))
        }
    }
}
