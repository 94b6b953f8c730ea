//! Rate limiting for outbound provider calls across a whole run.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use nimbus_model::RateLimitRule;
use tokio::time::Instant;

/// Proof that a call may proceed under the configured rate.
#[derive(Debug, Clone, Copy)]
pub struct RatePermit {
    pub granted_at: Instant,
    /// Position of this grant in the run, starting at 1.
    pub sequence: u64,
}

/// Gate every outbound provider operation passes through.
#[async_trait]
pub trait CallThrottle: Send + Sync + fmt::Debug {
    /// Suspend until the rate allows another operation. Never fails; bound
    /// the wait with a cancellation token if needed.
    async fn acquire(&self) -> RatePermit;

    /// Number of permits handed out so far.
    fn granted(&self) -> u64;
}

/// Fixed-window limiter: at most `limit` permits per `window`.
///
/// Waiters queue on tokio's fair mutex, so permits are granted in arrival
/// order and the head of the queue sleeps out a full window while holding
/// the lock.
pub struct FixedWindowLimiter {
    rule: RateLimitRule,
    state: tokio::sync::Mutex<WindowState>,
    granted: AtomicU64,
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    used: u32,
}

impl fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FixedWindowLimiter");
        debug
            .field("rule", &self.rule)
            .field("granted", &self.granted.load(Ordering::Relaxed));

        match self.state.try_lock() {
            Ok(state) => {
                debug.field("used_in_window", &state.used);
            }
            Err(_) => {
                debug.field("state", &"<locked>");
            }
        }

        debug.finish()
    }
}

impl FixedWindowLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            state: tokio::sync::Mutex::new(WindowState {
                window_start: Instant::now(),
                used: 0,
            }),
            granted: AtomicU64::new(0),
        }
    }

    pub fn shared(rule: RateLimitRule) -> Arc<dyn CallThrottle> {
        Arc::new(Self::new(rule))
    }

    pub fn rule(&self) -> &RateLimitRule {
        &self.rule
    }
}

#[async_trait]
impl CallThrottle for FixedWindowLimiter {
    async fn acquire(&self) -> RatePermit {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.rule.window {
            state.window_start = now;
            state.used = 0;
        }

        if state.used >= self.rule.limit {
            let next_window = state.window_start + self.rule.window;
            tracing::trace!(
                target: "nimbus::limiter",
                rule = %self.rule.name,
                limit = self.rule.limit,
                "rate window exhausted; waiting for next window"
            );
            tokio::time::sleep_until(next_window).await;
            state.window_start = Instant::now();
            state.used = 0;
        }

        state.used += 1;
        let sequence = self.granted.fetch_add(1, Ordering::Relaxed) + 1;
        RatePermit {
            granted_at: Instant::now(),
            sequence,
        }
    }

    fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rule(limit: u32, window: Duration) -> RateLimitRule {
        RateLimitRule {
            name: "test".into(),
            limit,
            window,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permits_beyond_limit_wait_for_next_window() {
        let limiter = FixedWindowLimiter::new(rule(2, Duration::from_secs(1)));
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await;
        }

        // Windows: [1,2] immediately, [3,4] after 1s, [5] after 2s.
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(limiter.granted(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_default_never_waits() {
        let limiter = FixedWindowLimiter::new(RateLimitRule::default());
        let start = Instant::now();

        for _ in 0..1_000 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_are_served_in_arrival_order() {
        let limiter =
            Arc::new(FixedWindowLimiter::new(rule(1, Duration::from_millis(100))));
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..4u32 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let permit = limiter.acquire().await;
                order.lock().await.push((id, permit.sequence));
            }));
            // Let each task reach the mutex before spawning the next.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.expect("waiter task");
        }

        let order = order.lock().await;
        let ids: Vec<u32> = order.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
