//! Request rate governor
//!
//! Gates every request to the search API so the configured requests-per-minute
//! budget is never exceeded. One governor is shared by every session in a run
//! (the budget belongs to the API key, not to a query), so its state sits
//! behind an async mutex and waiters are admitted in arrival order.

use crate::config::{LimitsConfig, RateStrategy};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Length of the fixed rate window
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Bookkeeping for whichever strategy is active
#[derive(Debug, Default)]
struct GovernorState {
    window_start: Option<Instant>,
    window_count: u32,
    last_request: Option<Instant>,
    admitted: u64,
}

/// Scheduling gate that enforces the request budget
#[derive(Debug)]
pub struct RateGovernor {
    strategy: RateStrategy,
    limit: u32,
    window: Duration,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    /// Creates a governor allowing `limit` requests per `window`
    ///
    /// A zero `limit` is treated as one.
    pub fn new(strategy: RateStrategy, limit: u32, window: Duration) -> Self {
        Self {
            strategy,
            limit: limit.max(1),
            window,
            state: Mutex::new(GovernorState::default()),
        }
    }

    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(config.strategy, config.requests_per_minute, RATE_WINDOW)
    }

    pub fn strategy(&self) -> RateStrategy {
        self.strategy
    }

    /// Minimum spacing between requests under the interval strategy
    pub fn interval(&self) -> Duration {
        self.window / self.limit
    }

    /// Waits until one more request fits the budget, then records it
    pub async fn admit(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            match self.wait_duration(&state, now) {
                None => {
                    self.record(&mut state, now);
                    return;
                }
                Some(wait) => {
                    tracing::debug!(
                        wait_ms = wait.as_millis() as u64,
                        strategy = ?self.strategy,
                        "Request budget spent, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Total requests admitted so far
    pub async fn admitted(&self) -> u64 {
        self.state.lock().await.admitted
    }

    /// How long a request arriving at `now` must wait, or `None` if it may go
    fn wait_duration(&self, state: &GovernorState, now: Instant) -> Option<Duration> {
        match self.strategy {
            RateStrategy::Window => {
                let start = state.window_start?;
                let elapsed = now.saturating_duration_since(start);
                if elapsed >= self.window || state.window_count < self.limit {
                    None
                } else {
                    Some(self.window - elapsed)
                }
            }
            RateStrategy::Interval => {
                let last = state.last_request?;
                let elapsed = now.saturating_duration_since(last);
                let interval = self.interval();
                if elapsed >= interval {
                    None
                } else {
                    Some(interval - elapsed)
                }
            }
        }
    }

    fn record(&self, state: &mut GovernorState, now: Instant) {
        let window_expired = state
            .window_start
            .map_or(true, |start| now.saturating_duration_since(start) >= self.window);
        if window_expired {
            state.window_start = Some(now);
            state.window_count = 0;
        }
        state.window_count += 1;
        state.last_request = Some(now);
        state.admitted += 1;
    }
}
