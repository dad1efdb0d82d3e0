//! Run statistics
//!
//! This module aggregates session reports from a multi-query run and prints
//! them once the run is over.

use crate::search::{SessionOutcome, SessionReport};
use std::collections::HashMap;
use std::time::Duration;

/// A query that ended in an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub query: String,
    pub message: String,
}

/// Totals for a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Reports of sessions that finished without error
    pub reports: Vec<SessionReport>,

    /// Sessions that ended in an error
    pub failures: Vec<QueryFailure>,

    /// Set when an error stopped the run before every query was tried
    pub stopped_early: Option<String>,

    /// Blank lines skipped in the query list
    pub skipped_blank: u32,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_report(&mut self, report: SessionReport) {
        self.reports.push(report);
    }

    pub fn record_failure(&mut self, query: impl Into<String>, message: impl Into<String>) {
        self.failures.push(QueryFailure {
            query: query.into(),
            message: message.into(),
        });
    }

    /// Total URLs written across every session
    pub fn total_accepted(&self) -> u64 {
        self.reports.iter().map(|r| u64::from(r.accepted)).sum()
    }

    /// Total URLs dropped by the filter
    pub fn total_rejected(&self) -> u64 {
        self.reports.iter().map(|r| u64::from(r.rejected)).sum()
    }

    /// Total API requests, including retries
    pub fn total_requests(&self) -> u64 {
        self.reports.iter().map(|r| u64::from(r.requests)).sum()
    }

    /// Count of finished sessions per outcome
    pub fn outcome_counts(&self) -> HashMap<SessionOutcome, u32> {
        let mut counts = HashMap::new();
        for report in &self.reports {
            *counts.entry(report.outcome).or_insert(0) += 1;
        }
        counts
    }

    pub fn queries_attempted(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    /// Longest single session
    pub fn slowest_session(&self) -> Option<(&str, Duration)> {
        self.reports
            .iter()
            .max_by_key(|r| r.elapsed)
            .map(|r| (r.query.as_str(), r.elapsed))
    }

    /// Returns true if the run should be reported as failed
    pub fn is_failure(&self) -> bool {
        self.stopped_early.is_some()
    }
}

/// Prints the run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Overview:");
    println!("  Queries attempted: {}", summary.queries_attempted());
    println!("  URLs written: {}", summary.total_accepted());
    println!("  URLs filtered out: {}", summary.total_rejected());
    println!("  API requests: {}", summary.total_requests());
    if summary.skipped_blank > 0 {
        println!("  Blank lines skipped: {}", summary.skipped_blank);
    }
    println!();

    println!("Sessions by Outcome:");
    let mut outcome_counts: Vec<_> = summary.outcome_counts().into_iter().collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(&a.1));
    for (outcome, count) in outcome_counts {
        println!("  {}: {}", outcome, count);
    }
    if !summary.failures.is_empty() {
        println!("  failed: {}", summary.failures.len());
    }
    println!();

    if !summary.failures.is_empty() {
        println!("Failures ({}):", summary.failures.len());
        for failure in &summary.failures {
            println!("  - '{}': {}", failure.query, failure.message);
        }
        println!();
    }

    if let Some((query, elapsed)) = summary.slowest_session() {
        println!("Slowest session: '{}' ({:.1}s)", query, elapsed.as_secs_f64());
    }

    if let Some(reason) = &summary.stopped_early {
        println!("Run stopped early: {}", reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(query: &str, outcome: SessionOutcome, accepted: u32, secs: u64) -> SessionReport {
        SessionReport {
            query: query.to_string(),
            outcome,
            accepted,
            rejected: 1,
            pages: 1,
            requests: 2,
            malformed_retries: 0,
            rate_limited_retries: 1,
            last_cursor: 1,
            elapsed: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_totals() {
        let mut summary = RunSummary::new();
        summary.record_report(report("a", SessionOutcome::Exhausted, 7, 3));
        summary.record_report(report("b", SessionOutcome::Capped, 5, 9));
        summary.record_report(report("c", SessionOutcome::Exhausted, 0, 1));
        summary.record_failure("d", "Unexpected response status 403");

        assert_eq!(summary.total_accepted(), 12);
        assert_eq!(summary.total_rejected(), 3);
        assert_eq!(summary.total_requests(), 6);
        assert_eq!(summary.queries_attempted(), 4);

        let counts = summary.outcome_counts();
        assert_eq!(counts.get(&SessionOutcome::Exhausted), Some(&2));
        assert_eq!(counts.get(&SessionOutcome::Capped), Some(&1));
        assert_eq!(counts.get(&SessionOutcome::Abandoned), None);

        assert_eq!(summary.slowest_session(), Some(("b", Duration::from_secs(9))));
    }

    #[test]
    fn test_failure_only_when_stopped_early() {
        let mut summary = RunSummary::new();
        summary.record_failure("q", "boom");
        assert!(!summary.is_failure());

        summary.stopped_early = Some("rate limit ceiling".to_string());
        assert!(summary.is_failure());
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::new();
        assert_eq!(summary.total_accepted(), 0);
        assert_eq!(summary.slowest_session(), None);
        print_summary(&summary);
    }
}
