//! Queuing rate limiter for outbound provider requests.
//!
//! Enforces at most `limit` acquisitions per fixed window. Callers over the
//! limit are queued FIFO and released when the next window opens — no
//! request is ever dropped. On shutdown, queued waiters are rejected with
//! [`FetchError::ShuttingDown`] instead of being left pending.
//!
//! Uses `tokio::time` throughout, so tests run deterministically under
//! `#[tokio::test(start_paused = true)]` without real sleeps.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{FetchError, Result};

type Waiter = oneshot::Sender<Result<()>>;

#[derive(Debug)]
struct LimiterState {
    window_start: Instant,
    count: u32,
    queue: VecDeque<Waiter>,
    drain_scheduled: bool,
    shut_down: bool,
}

/// Process-wide request rate limiter with a FIFO overflow queue.
///
/// Construct one per pipeline and share it via [`Arc`]; the retry executor
/// acquires a slot before every network attempt, including retries.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` acquisitions per `window`.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Arc::new(Mutex::new(LimiterState {
                window_start: Instant::now(),
                count: 0,
                queue: VecDeque::new(),
                drain_scheduled: false,
                shut_down: false,
            })),
        }
    }

    /// Resolve when the caller may proceed.
    ///
    /// If the current window has capacity and nobody is queued ahead, this
    /// resolves immediately. Otherwise the caller joins a FIFO queue and is
    /// released when a window opens; queued callers are always served
    /// before new arrivals.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ShuttingDown`] if [`RateLimiter::shutdown`]
    /// has been called.
    pub async fn acquire(&self) -> Result<()> {
        let rx = {
            let mut state = self.lock();
            if state.shut_down {
                return Err(FetchError::ShuttingDown);
            }

            // While waiters are queued the drain task owns rollover;
            // rolling here would move the boundary out from under its
            // sleep and stall the queue for another window.
            if state.queue.is_empty() {
                let now = Instant::now();
                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.count = 0;
                }
                if state.count < self.limit {
                    state.count += 1;
                    return Ok(());
                }
            }

            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            if !state.drain_scheduled {
                state.drain_scheduled = true;
                tokio::spawn(drain_queue(
                    Arc::clone(&self.state),
                    self.limit,
                    self.window,
                ));
            }
            rx
        };

        match rx.await {
            Ok(outcome) => outcome,
            // Sender dropped without resolving; only happens at teardown.
            Err(_) => Err(FetchError::ShuttingDown),
        }
    }

    /// Number of acquisitions still available in the current window.
    pub fn remaining(&self) -> u32 {
        let state = self.lock();
        if Instant::now().duration_since(state.window_start) >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(state.count)
        }
    }

    /// Reject all queued waiters and refuse future acquisitions.
    pub fn shutdown(&self) {
        let waiters: Vec<Waiter> = {
            let mut state = self.lock();
            state.shut_down = true;
            state.queue.drain(..).collect()
        };
        for waiter in waiters {
            let _ = waiter.send(Err(FetchError::ShuttingDown));
        }
        tracing::debug!("rate limiter shut down");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background task: sleep until the window boundary, then release queued
/// waiters (up to `limit` per window) until the queue is empty.
async fn drain_queue(state: Arc<Mutex<LimiterState>>, limit: u32, window: Duration) {
    loop {
        let deadline = {
            let guard = state.lock().unwrap_or_else(|e| e.into_inner());
            if guard.shut_down {
                return;
            }
            guard.window_start + window
        };
        tokio::time::sleep_until(deadline).await;

        let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
        if guard.shut_down {
            guard.drain_scheduled = false;
            return;
        }
        let now = Instant::now();
        if now.duration_since(guard.window_start) < window {
            // Window rolled forward while we slept; sleep again.
            continue;
        }
        guard.window_start = now;
        guard.count = 0;
        while guard.count < limit {
            let Some(waiter) = guard.queue.pop_front() else {
                break;
            };
            // A send failure means the caller went away; its slot stays free.
            if waiter.send(Ok(())).is_ok() {
                guard.count += 1;
            }
        }
        if guard.queue.is_empty() {
            guard.drain_scheduled = false;
            return;
        }
    }
}
