use crate::state::SessionPhase;
use std::time::Duration;
use tokio::time::Instant;

/// First value of the API's `start` parameter
pub const FIRST_CURSOR: u32 = 1;

/// Mutable state for one query's fetch session
///
/// Created by the fetch controller when a session starts and dropped when it
/// ends; nothing in here outlives a single query.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current `start` offset, never decreases
    pub cursor: u32,

    /// URLs written to the sink so far
    pub accepted: u32,

    /// URLs dropped by the filter so far
    pub rejected: u32,

    /// Successful pages processed
    pub pages: u32,

    /// Requests issued, including retries
    pub requests: u32,

    /// Malformed-request responses since the last successful page
    pub consecutive_malformed: u32,

    /// Rate-limit responses since the last successful page
    pub consecutive_rate_limited: u32,

    /// Malformed-request retries over the whole session
    pub malformed_retries: u32,

    /// Rate-limit retries over the whole session
    pub rate_limited_retries: u32,

    /// Backoff the next rate-limit response will wait
    pub backoff: Duration,

    /// Maximum accepted URLs for this session
    pub cap: u32,

    phase: SessionPhase,
    started_at: Instant,
}

impl SessionState {
    /// Creates state in the `Starting` phase
    pub fn new(cap: u32, backoff_floor: Duration) -> Self {
        Self {
            cursor: FIRST_CURSOR,
            accepted: 0,
            rejected: 0,
            pages: 0,
            requests: 0,
            consecutive_malformed: 0,
            consecutive_rate_limited: 0,
            malformed_retries: 0,
            rate_limited_retries: 0,
            backoff: backoff_floor,
            cap,
            phase: SessionPhase::Starting,
            started_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Moves to `next`
    pub fn enter(&mut self, next: SessionPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid session transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!(from = %self.phase, to = %next, "Session phase change");
        self.phase = next;
    }

    /// Records a successful page and clears the retry bookkeeping
    pub fn page_succeeded(&mut self, backoff_floor: Duration) {
        self.pages += 1;
        self.consecutive_malformed = 0;
        self.consecutive_rate_limited = 0;
        self.backoff = backoff_floor;
    }

    /// Records one accepted URL
    pub fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Returns true once the accepted count has reached the cap
    pub fn is_capped(&self) -> bool {
        self.accepted >= self.cap
    }

    /// Moves the cursor forward to `next`
    ///
    /// Returns false without touching the cursor if `next` would not advance
    /// it; a non-advancing next-page token is treated as the end of results.
    pub fn advance_cursor(&mut self, next: u32) -> bool {
        if next <= self.cursor {
            return false;
        }
        self.cursor = next;
        true
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
