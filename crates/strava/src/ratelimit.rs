//! Fixed-window rate limiter guarding all Strava calls.
//!
//! One counter per process. The window resets `window` after its first
//! request; exhaustion yields [`Error::RateLimited`] so callers can surface
//! the condition as a tool result and keep the loop alive.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use pl_domain::error::{Error, Result};

pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Take one slot, or fail with `RateLimited` naming the wait.
    pub fn try_acquire(&self) -> Result<()> {
        let mut state = self.state.lock();
        let elapsed = state.window_start.elapsed();

        if elapsed >= self.window {
            state.window_start = Instant::now();
            state.count = 0;
        }

        if state.count >= self.limit {
            let wait = self.window.saturating_sub(elapsed);
            return Err(Error::RateLimited(format!(
                "window exhausted, retry in {}s",
                wait.as_secs().max(1)
            )));
        }

        state.count += 1;
        Ok(())
    }

    /// Slots left in the current window.
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock();
        if state.window_start.elapsed() >= self.window {
            return self.limit;
        }
        self.limit.saturating_sub(state.count)
    }
}
