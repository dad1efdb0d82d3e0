//! Harvester - runs fetch sessions for one query or a list of queries
//!
//! This module wires the configured collaborators together and drives the
//! fetch controller:
//! - Builds the HTTP fetcher, shared rate governor, filter and backoff policy
//! - Runs a single query and propagates its error
//! - Runs a query list sequentially or on a bounded worker pool, logging
//!   per-query failures and stopping the run on a rate-limit ceiling

use crate::config::Config;
use crate::filter::{Denylist, Filter};
use crate::output::{RunSummary, SharedSink, Sink};
use crate::search::backoff::BackoffPolicy;
use crate::search::controller::{FetchController, SessionLimits, SessionReport};
use crate::search::fetcher::{HttpPageFetcher, PageFetcher};
use crate::search::governor::RateGovernor;
use crate::search::Query;
use crate::HarvestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs fetch sessions against one search API
pub struct Harvester<F: ?Sized = HttpPageFetcher> {
    controller: FetchController<F>,
    concurrency: usize,
}

impl Harvester<HttpPageFetcher> {
    /// Builds a harvester from a validated configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use serp_harvest::config::load_config;
    /// use serp_harvest::output::FileSink;
    /// use serp_harvest::Harvester;
    /// use std::path::Path;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_config(Path::new("serp-harvest.toml"))?;
    /// let harvester = Harvester::from_config(&config)?;
    /// let mut sink = FileSink::open(Path::new(&config.output.path))?;
    /// let report = harvester.run_query("inurl:login", &mut sink).await?;
    /// println!("{} URLs written", report.accepted);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let fetcher = Arc::new(HttpPageFetcher::from_config(&config.api)?);
        Ok(Self::with_fetcher(fetcher, config))
    }
}

impl<F: PageFetcher + ?Sized + 'static> Harvester<F> {
    /// Builds a harvester around any fetcher, taking everything else from `config`
    pub fn with_fetcher(fetcher: Arc<F>, config: &Config) -> Self {
        let governor = Arc::new(RateGovernor::from_config(&config.limits));
        let filter = Arc::new(Filter::new(Denylist::new(config.denylist_domains())));
        let controller = FetchController::new(
            fetcher,
            governor,
            filter,
            BackoffPolicy::from_config(&config.retry),
            SessionLimits::from_config(config),
        );

        tracing::debug!(
            strategy = ?config.limits.strategy,
            requests_per_minute = config.limits.requests_per_minute,
            denylist = config.denylist.len(),
            "Harvester ready"
        );

        Self {
            controller,
            concurrency: 1,
        }
    }

    /// Sets how many sessions may run at once; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn controller(&self) -> &FetchController<F> {
        &self.controller
    }

    /// Runs one query to completion
    pub async fn run_query<S: Sink + ?Sized>(
        &self,
        raw_query: &str,
        sink: &mut S,
    ) -> Result<SessionReport, HarvestError> {
        let query = Query::new(raw_query)?;
        self.controller.run(&query, sink).await
    }

    /// Runs every query in `queries`
    ///
    /// Blank queries are skipped. A failed query is logged and recorded in
    /// the summary, and the run moves on; a rate-limit ceiling stops the run.
    pub async fn run_queries<I, S>(&self, queries: I, sink: SharedSink<S>) -> RunSummary
    where
        I: IntoIterator<Item = String>,
        S: Sink + Send + 'static,
    {
        let mut summary = RunSummary::new();
        let mut parsed = Vec::new();
        for raw in queries {
            match Query::new(&raw) {
                Ok(query) => parsed.push(query),
                Err(_) => summary.skipped_blank += 1,
            }
        }

        tracing::info!(
            queries = parsed.len(),
            concurrency = self.concurrency,
            "Starting run"
        );

        if self.concurrency == 1 {
            self.run_sequential(parsed, sink, &mut summary).await;
        } else {
            self.run_concurrent(parsed, sink, &mut summary).await;
        }

        tracing::info!(
            sessions = summary.reports.len(),
            failures = summary.failures.len(),
            accepted = summary.total_accepted(),
            "Run finished"
        );

        summary
    }

    async fn run_sequential<S>(
        &self,
        queries: Vec<Query>,
        mut sink: SharedSink<S>,
        summary: &mut RunSummary,
    ) where
        S: Sink + Send + 'static,
    {
        for query in queries {
            let result = self.controller.run(&query, &mut sink).await;
            if record_result(summary, &query, result) {
                break;
            }
        }
    }

    async fn run_concurrent<S>(
        &self,
        queries: Vec<Query>,
        sink: SharedSink<S>,
        summary: &mut RunSummary,
    ) where
        S: Sink + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for query in queries {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };

            // Collect whatever has finished so a fatal error is seen before spawning more
            while let Some(joined) = tasks.try_join_next() {
                handle_joined(summary, &stop, joined);
            }
            if stop.load(Ordering::SeqCst) {
                break;
            }

            let controller = self.controller.clone();
            let mut sink = sink.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = controller.run(&query, &mut sink).await;
                (query, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if handle_joined(summary, &stop, joined) {
                tasks.abort_all();
            }
        }
    }
}

type Joined = Result<(Query, Result<SessionReport, HarvestError>), tokio::task::JoinError>;

/// Records a finished worker; returns true if the run must stop
fn handle_joined(summary: &mut RunSummary, stop: &AtomicBool, joined: Joined) -> bool {
    match joined {
        Ok((query, result)) => {
            if record_result(summary, &query, result) {
                stop.store(true, Ordering::SeqCst);
                return true;
            }
            false
        }
        Err(e) if e.is_cancelled() => false,
        Err(e) => {
            let error = HarvestError::from(e);
            tracing::error!("{}", error);
            summary.record_failure("<worker>", error.to_string());
            false
        }
    }
}

/// Records one session result; returns true if the run must stop
fn record_result(
    summary: &mut RunSummary,
    query: &Query,
    result: Result<SessionReport, HarvestError>,
) -> bool {
    match result {
        Ok(report) => {
            summary.record_report(report);
            false
        }
        Err(e) if e.is_run_fatal() => {
            tracing::error!(query = %query, "Stopping run: {}", e);
            summary.record_failure(query.as_str(), e.to_string());
            summary.stopped_early = Some(e.to_string());
            true
        }
        Err(e) => {
            tracing::error!(query = %query, "Error processing query: {}", e);
            summary.record_failure(query.as_str(), e.to_string());
            false
        }
    }
}
