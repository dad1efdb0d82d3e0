//! Search module for paging through search API results
//!
//! This module contains the fetch-control logic, including:
//! - Query normalization
//! - The request rate governor
//! - Exponential backoff for rate-limit responses
//! - The HTTP page fetcher and its status classification
//! - The per-query fetch controller
//! - The harvester that runs single queries and query lists

mod backoff;
mod controller;
mod fetcher;
mod governor;
mod harvester;
mod query;

pub use backoff::BackoffPolicy;
pub use controller::{FetchController, SessionLimits, SessionOutcome, SessionReport};
pub use fetcher::{
    build_http_client, parse_search_page, FetchOutcome, HttpPageFetcher, PageFetcher, SearchPage,
};
pub use governor::{RateGovernor, RATE_WINDOW};
pub use harvester::Harvester;
pub use query::Query;
