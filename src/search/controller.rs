//! Fetch controller - the per-query fetch-control loop
//!
//! Drives one query from the first page until it is exhausted, hits the
//! result cap, or fails. Each iteration:
//! 1. Waits for the rate governor
//! 2. Fetches the page at the current cursor
//! 3. Classifies the outcome (page, malformed, rate limited, unexpected)
//! 4. Filters the page's items and appends accepted ones to the sink
//! 5. Moves the cursor or stops

use crate::config::Config;
use crate::filter::Filter;
use crate::output::Sink;
use crate::search::backoff::BackoffPolicy;
use crate::search::fetcher::{FetchOutcome, PageFetcher};
use crate::search::governor::RateGovernor;
use crate::search::Query;
use crate::state::{SessionPhase, SessionState};
use crate::HarvestError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOutcome {
    /// The result cap was reached
    Capped,

    /// The API had no more results
    Exhausted,

    /// Malformed-request retries ran out; the query was skipped
    Abandoned,
}

impl SessionOutcome {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Capped => SessionPhase::Capped,
            Self::Exhausted => SessionPhase::Exhausted,
            Self::Abandoned => SessionPhase::Abandoned,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase())
    }
}

/// Summary of one finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub query: String,
    pub outcome: SessionOutcome,
    pub accepted: u32,
    pub rejected: u32,
    pub pages: u32,
    pub requests: u32,
    pub malformed_retries: u32,
    pub rate_limited_retries: u32,
    /// Cursor of the last page requested
    pub last_cursor: u32,
    pub elapsed: Duration,
}

/// Per-session limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Maximum accepted URLs per query
    pub result_cap: u32,

    /// HTTP 400 retries before the query is abandoned
    pub max_malformed_retries: u32,

    /// Wait between HTTP 400 retries
    pub malformed_delay: Duration,
}

impl SessionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            result_cap: config.limits.result_cap,
            max_malformed_retries: config.retry.max_malformed_retries,
            malformed_delay: config.retry.malformed_delay(),
        }
    }
}

/// Runs fetch sessions, one query at a time per call
///
/// The controller holds only shared, read-only collaborators; every call to
/// [`FetchController::run`] creates and owns its own [`SessionState`].
/// Cloning is cheap and clones share the same governor.
pub struct FetchController<F: ?Sized> {
    fetcher: Arc<F>,
    governor: Arc<RateGovernor>,
    filter: Arc<Filter>,
    backoff: BackoffPolicy,
    limits: SessionLimits,
}

impl<F: ?Sized> Clone for FetchController<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            governor: Arc::clone(&self.governor),
            filter: Arc::clone(&self.filter),
            backoff: self.backoff,
            limits: self.limits,
        }
    }
}

impl<F: PageFetcher + ?Sized> FetchController<F> {
    pub fn new(
        fetcher: Arc<F>,
        governor: Arc<RateGovernor>,
        filter: Arc<Filter>,
        backoff: BackoffPolicy,
        limits: SessionLimits,
    ) -> Self {
        Self {
            fetcher,
            governor,
            filter,
            backoff,
            limits,
        }
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Fetches every page for `query`, appending accepted URLs to `sink`
    ///
    /// # Returns
    ///
    /// * `Ok(SessionReport)` - Session ended as Capped, Exhausted or Abandoned
    /// * `Err(HarvestError::RateLimitCeiling)` - Backoff would pass its ceiling;
    ///   the whole run should stop
    /// * `Err(HarvestError)` - Unexpected status, transport, decode or sink
    ///   failure; only this query is lost
    pub async fn run<S: Sink + ?Sized>(
        &self,
        query: &Query,
        sink: &mut S,
    ) -> Result<SessionReport, HarvestError> {
        let mut state = SessionState::new(self.limits.result_cap, self.backoff.reset());
        tracing::info!(query = %query, cap = self.limits.result_cap, "Starting session");

        // A zero cap admits nothing, so no request is made
        if state.is_capped() {
            state.enter(SessionPhase::Capped);
            return Ok(self.report(query, &state, SessionOutcome::Capped));
        }

        loop {
            state.enter(SessionPhase::Fetching);
            self.governor.admit().await;
            state.requests += 1;

            let outcome = match self.fetcher.fetch(query, state.cursor).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.enter(SessionPhase::Fatal);
                    return Err(e);
                }
            };

            let page = match outcome {
                FetchOutcome::Page(page) => page,

                FetchOutcome::Malformed { status, message } => {
                    state.consecutive_malformed += 1;
                    if state.consecutive_malformed > self.limits.max_malformed_retries {
                        tracing::warn!(
                            query = %query,
                            status,
                            %message,
                            "Max retries reached, abandoning query"
                        );
                        state.enter(SessionPhase::Abandoned);
                        return Ok(self.report(query, &state, SessionOutcome::Abandoned));
                    }

                    state.malformed_retries += 1;
                    state.enter(SessionPhase::RetryingTransient);
                    tracing::info!(
                        query = %query,
                        attempt = state.consecutive_malformed,
                        %message,
                        "Malformed request, retrying"
                    );
                    tokio::time::sleep(self.limits.malformed_delay).await;
                    continue;
                }

                FetchOutcome::RateLimited => {
                    state.consecutive_rate_limited += 1;
                    if state.consecutive_rate_limited > 1 {
                        match self.backoff.next_delay(state.backoff) {
                            Some(next) => state.backoff = next,
                            None => {
                                tracing::error!(
                                    query = %query,
                                    ceiling_ms = self.backoff.ceiling().as_millis() as u64,
                                    "Exceeded maximum backoff"
                                );
                                state.enter(SessionPhase::Fatal);
                                return Err(HarvestError::RateLimitCeiling {
                                    query: query.to_string(),
                                    ceiling: self.backoff.ceiling(),
                                });
                            }
                        }
                    }

                    state.rate_limited_retries += 1;
                    state.enter(SessionPhase::RetryingRateLimited);
                    let wait = self.backoff.jittered(state.backoff);
                    tracing::warn!(
                        query = %query,
                        delay_ms = wait.as_millis() as u64,
                        "Received 429 Too Many Requests, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }

                FetchOutcome::Unexpected { status, message } => {
                    state.enter(SessionPhase::Fatal);
                    return Err(HarvestError::UnexpectedStatus {
                        query: query.to_string(),
                        status,
                        message,
                    });
                }
            };

            state.page_succeeded(self.backoff.reset());
            state.enter(SessionPhase::Filtering);
            tracing::debug!(
                query = %query,
                cursor = state.cursor,
                items = page.items.len(),
                next = ?page.next_cursor,
                "Fetched page"
            );

            if page.items.is_empty() {
                state.enter(SessionPhase::Exhausted);
                return Ok(self.report(query, &state, SessionOutcome::Exhausted));
            }

            for link in &page.items {
                if let Some(entry) = self.filter.rejected_by(link) {
                    tracing::trace!(url = %link, denylisted = entry, "Rejected result");
                    state.record_rejected();
                    continue;
                }

                if let Err(e) = sink.append(link) {
                    state.enter(SessionPhase::Fatal);
                    return Err(e.into());
                }
                state.record_accepted();

                if state.is_capped() {
                    tracing::info!(query = %query, cap = state.cap, "Result cap reached");
                    state.enter(SessionPhase::Capped);
                    return Ok(self.report(query, &state, SessionOutcome::Capped));
                }
            }

            state.enter(SessionPhase::Paginating);
            match page.next_cursor {
                Some(next) if state.advance_cursor(next) => {}
                Some(next) => {
                    tracing::warn!(
                        query = %query,
                        cursor = state.cursor,
                        next,
                        "Next page does not advance the cursor, stopping"
                    );
                    state.enter(SessionPhase::Exhausted);
                    return Ok(self.report(query, &state, SessionOutcome::Exhausted));
                }
                None => {
                    state.enter(SessionPhase::Exhausted);
                    return Ok(self.report(query, &state, SessionOutcome::Exhausted));
                }
            }
        }
    }

    fn report(&self, query: &Query, state: &SessionState, outcome: SessionOutcome) -> SessionReport {
        let report = SessionReport {
            query: query.to_string(),
            outcome,
            accepted: state.accepted,
            rejected: state.rejected,
            pages: state.pages,
            requests: state.requests,
            malformed_retries: state.malformed_retries,
            rate_limited_retries: state.rate_limited_retries,
            last_cursor: state.cursor,
            elapsed: state.elapsed(),
        };

        tracing::info!(
            query = %query,
            outcome = %outcome,
            accepted = report.accepted,
            rejected = report.rejected,
            pages = report.pages,
            "Session finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateStrategy;
    use crate::filter::Denylist;
    use crate::output::{MemorySink, OutputError, OutputResult};
    use crate::search::fetcher::SearchPage;
    use crate::search::governor::RATE_WINDOW;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed list of outcomes and records each request's cursor and time
    struct ScriptedFetcher {
        script: Mutex<VecDeque<FetchOutcome>>,
        repeat_last: bool,
        calls: Mutex<Vec<(u32, Instant)>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<FetchOutcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                repeat_last: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn repeating(outcome: FetchOutcome) -> Self {
            Self {
                script: Mutex::new(VecDeque::from(vec![outcome])),
                repeat_last: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<u32> {
            self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
        }

        fn times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _query: &Query, cursor: u32) -> Result<FetchOutcome, HarvestError> {
            self.calls.lock().unwrap().push((cursor, Instant::now()));
            let mut script = self.script.lock().unwrap();
            let outcome = if self.repeat_last && script.len() == 1 {
                script.front().cloned()
            } else {
                script.pop_front()
            };
            Ok(outcome.expect("script exhausted"))
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn append(&mut self, _url: &str) -> OutputResult<()> {
            Err(OutputError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    fn page(items: &[&str], next: Option<u32>) -> FetchOutcome {
        FetchOutcome::Page(SearchPage {
            items: items.iter().map(|s| s.to_string()).collect(),
            next_cursor: next,
        })
    }

    fn urls(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://{}{}.example/", prefix, i)).collect()
    }

    fn limits(cap: u32) -> SessionLimits {
        SessionLimits {
            result_cap: cap,
            max_malformed_retries: 3,
            malformed_delay: Duration::from_secs(2),
        }
    }

    fn controller(fetcher: Arc<ScriptedFetcher>, cap: u32) -> FetchController<ScriptedFetcher> {
        FetchController::new(
            fetcher,
            Arc::new(RateGovernor::new(RateStrategy::Window, 1_000, RATE_WINDOW)),
            Arc::new(Filter::new(Denylist::new(["reddit.com", "github.com"]))),
            BackoffPolicy::new(
                Duration::from_secs(5),
                Duration::from_secs(80),
                Duration::from_secs(1),
            ),
            limits(cap),
        )
    }

    fn query() -> Query {
        Query::new("foo").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_empty_second_page() {
        let mut first: Vec<String> = urls("site", 7);
        first.push("https://www.reddit.com/r/a".to_string());
        first.push("https://github.com/b".to_string());
        first.push("https://old.reddit.com/c".to_string());
        let first_refs: Vec<&str> = first.iter().map(String::as_str).collect();

        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&first_refs, Some(11)),
            page(&[], Some(21)),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Exhausted);
        assert_eq!(report.accepted, 7);
        assert_eq!(report.rejected, 3);
        assert_eq!(sink.lines(), urls("site", 7).as_slice());
        assert_eq!(fetcher.cursors(), vec![1, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_stops_mid_page() {
        let items = urls("r", 8);
        let refs: Vec<&str> = items.iter().map(String::as_str).collect();
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(&refs, Some(11))]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 5)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Capped);
        assert_eq!(report.accepted, 5);
        assert_eq!(sink.lines(), &items[..5]);
        assert_eq!(fetcher.cursors(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cap_writes_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(
            &["https://a.example/", "https://b.example/"],
            None,
        )]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 0)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Capped);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.requests, 0);
        assert!(sink.lines().is_empty());
        assert!(fetcher.cursors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_across_pages() {
        let a = urls("a", 3);
        let b = urls("b", 3);
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&a.iter().map(String::as_str).collect::<Vec<_>>(), Some(4)),
            page(&b.iter().map(String::as_str).collect::<Vec<_>>(), Some(7)),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 4)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Capped);
        assert_eq!(sink.lines().len(), 4);
        assert_eq!(report.pages, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_next_page_exhausts() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(&["https://a.example/"], None)]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Exhausted);
        assert_eq!(report.accepted, 1);
        assert_eq!(fetcher.cursors(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_advancing_cursor_exhausts() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&["https://a.example/"], Some(11)),
            page(&["https://b.example/"], Some(11)),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Exhausted);
        assert_eq!(fetcher.cursors(), vec![1, 11]);
        assert_eq!(report.last_cursor, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursors_non_decreasing_with_retries() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&["https://a.example/"], Some(11)),
            FetchOutcome::RateLimited,
            FetchOutcome::Malformed {
                status: 400,
                message: "bad".to_string(),
            },
            page(&["https://b.example/"], Some(21)),
            page(&["https://c.example/"], None),
        ]));
        let mut sink = MemorySink::new();

        controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        let cursors = fetcher.cursors();
        assert_eq!(cursors, vec![1, 11, 11, 11, 21]);
        assert!(cursors.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_retries_then_abandons() {
        let fetcher = Arc::new(ScriptedFetcher::repeating(FetchOutcome::Malformed {
            status: 400,
            message: "Invalid Value".to_string(),
        }));
        let mut sink = MemorySink::new();
        let start = Instant::now();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Abandoned);
        // One initial attempt plus three retries, two seconds apart
        assert_eq!(fetcher.cursors().len(), 4);
        assert_eq!(report.malformed_retries, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert!(sink.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_counter_resets_on_success() {
        let bad = || FetchOutcome::Malformed {
            status: 400,
            message: String::new(),
        };
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            bad(),
            bad(),
            bad(),
            page(&["https://a.example/"], Some(11)),
            bad(),
            bad(),
            bad(),
            page(&["https://b.example/"], None),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Exhausted);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.malformed_retries, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_storm_hits_ceiling() {
        let fetcher = Arc::new(ScriptedFetcher::repeating(FetchOutcome::RateLimited));
        let mut sink = MemorySink::new();

        let err = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::RateLimitCeiling { .. }));
        assert!(err.is_run_fatal());

        // Waits of 5, 10, 20, 40 and 80 seconds, then the sixth 429 aborts
        let times = fetcher.times();
        assert_eq!(times.len(), 6);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let floors = [5u64, 10, 20, 40, 80];
        for (gap, floor) in gaps.iter().zip(floors) {
            assert!(*gap >= Duration::from_secs(floor), "gap {:?} < {}s", gap, floor);
            assert!(*gap <= Duration::from_secs(80), "gap {:?} above ceiling", gap);
        }
        assert!(gaps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_after_success() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            FetchOutcome::RateLimited,
            FetchOutcome::RateLimited,
            FetchOutcome::RateLimited,
            page(&["https://a.example/"], Some(11)),
            FetchOutcome::RateLimited,
            page(&["https://b.example/"], None),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();
        assert_eq!(report.rate_limited_retries, 4);

        let times = fetcher.times();
        // After the successful page the next 429 waits from the floor again
        let gap_after_reset = times[5] - times[4];
        assert!(gap_after_reset >= Duration::from_secs(5));
        assert!(gap_after_reset <= Duration::from_secs(6));

        let gap_before_success = times[3] - times[2];
        assert!(gap_before_success >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_fatal() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![FetchOutcome::Unexpected {
            status: 403,
            message: "Forbidden".to_string(),
        }]));
        let mut sink = MemorySink::new();

        let err = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::UnexpectedStatus { status: 403, .. }
        ));
        assert!(!err.is_run_fatal());
        assert_eq!(fetcher.cursors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_is_fatal() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![page(&["https://a.example/"], None)]));

        let err = controller(fetcher, 100)
            .run(&query(), &mut FailingSink)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Output(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_filtered_page_continues() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            page(&["https://github.com/x", "https://reddit.com/y"], Some(11)),
            page(&["https://ok.example/"], None),
        ]));
        let mut sink = MemorySink::new();

        let report = controller(fetcher.clone(), 100)
            .run(&query(), &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, SessionOutcome::Exhausted);
        assert_eq!(sink.lines(), &["https://ok.example/".to_string()]);
        assert_eq!(report.rejected, 2);
    }
}
