//! Search API page fetcher
//!
//! This module handles every HTTP request made to the search API, including:
//! - Building the HTTP client with the crate's user agent
//! - Encoding query, cursor and credentials into the request URL
//! - Classifying the response status
//! - Decoding result links and the next-page cursor
//!
//! # Status classification
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 200 | `Page` with items and optional next cursor |
//! | 400 | `Malformed`, retried a bounded number of times |
//! | 429 | `RateLimited`, retried with backoff |
//! | other | `Unexpected`, fatal for the query |

use crate::config::ApiConfig;
use crate::search::Query;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Longest error body excerpt kept in messages
const MAX_MESSAGE_LEN: usize = 300;

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Result links in API order
    pub items: Vec<String>,

    /// `start` value of the next page, if the API reported one
    pub next_cursor: Option<u32>,
}

/// Classified result of a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200 with a decoded body
    Page(SearchPage),

    /// HTTP 400
    Malformed { status: u16, message: String },

    /// HTTP 429
    RateLimited,

    /// Any other status
    Unexpected { status: u16, message: String },
}

/// Performs one request for one page of results
///
/// Transport and decoding failures are returned as errors; every HTTP
/// status, including failures, is reported as a [`FetchOutcome`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, query: &Query, cursor: u32) -> Result<FetchOutcome, HarvestError>;
}

/// Wire format of the search response, reduced to what is used
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    queries: Option<SearchQueries>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQueries {
    #[serde(rename = "nextPage", default)]
    next_page: Vec<PageRef>,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    #[serde(rename = "startIndex")]
    start_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<SearchResponse> for SearchPage {
    fn from(response: SearchResponse) -> Self {
        let items = response
            .items
            .into_iter()
            .filter_map(|item| item.link)
            .filter(|link| !link.is_empty())
            .collect();

        let next_cursor = response
            .queries
            .and_then(|q| q.next_page.into_iter().next())
            .and_then(|page| page.start_index);

        Self { items, next_cursor }
    }
}

/// Decodes a 200 response body
pub fn parse_search_page(body: &str) -> Result<SearchPage, serde_json::Error> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response.into())
}

/// Builds an HTTP client for the search API
///
/// # Example
///
/// ```no_run
/// use serp_harvest::search::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] backed by the Custom Search JSON API
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    endpoint: Url,
    key: String,
    cx: String,
    page_size: u32,
}

impl HttpPageFetcher {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.endpoint)?,
            key: config.key.clone(),
            cx: config.cx.clone(),
            page_size: config.page_size,
        })
    }

    /// Builds a fetcher with its own client
    pub fn from_config(config: &ApiConfig) -> Result<Self, HarvestError> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs))?;
        Self::new(client, config)
    }

    /// Builds the request URL for `query` at `cursor`
    ///
    /// Parameters are form encoded, so spaces in the query become `+`.
    pub fn request_url(&self, query: &Query, cursor: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.key)
            .append_pair("cx", &self.cx)
            .append_pair("q", query.as_str())
            .append_pair("start", &cursor.to_string())
            .append_pair("num", &self.page_size.to_string());
        url
    }

    /// Request URL with the API key masked, for logging
    pub fn redacted_url(&self, query: &Query, cursor: u32) -> String {
        let mut url = self.request_url(query, cursor);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let value = if k == "key" {
                    "REDACTED".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, query: &Query, cursor: u32) -> Result<FetchOutcome, HarvestError> {
        tracing::debug!(url = %self.redacted_url(query, cursor), "Requesting page");

        let response = self
            .client
            .get(self.request_url(query, cursor))
            .send()
            .await
            .map_err(|e| HarvestError::Http {
                query: query.to_string(),
                source: e.without_url(),
            })?;

        let status = response.status();

        // The body is read on every path so the connection goes back to the pool
        let body = response.text().await.map_err(|e| HarvestError::Http {
            query: query.to_string(),
            source: e.without_url(),
        })?;

        match status {
            StatusCode::OK => {
                let page = parse_search_page(&body).map_err(|source| HarvestError::Decode {
                    query: query.to_string(),
                    source,
                })?;
                Ok(FetchOutcome::Page(page))
            }
            StatusCode::BAD_REQUEST => Ok(FetchOutcome::Malformed {
                status: status.as_u16(),
                message: error_message(&body),
            }),
            StatusCode::TOO_MANY_REQUESTS => Ok(FetchOutcome::RateLimited),
            other => Ok(FetchOutcome::Unexpected {
                status: other.as_u16(),
                message: error_message(&body),
            }),
        }
    }
}

/// Extracts a readable message from an error response body
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.error.message;
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        let excerpt: String = trimmed.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{}...", excerpt)
    } else {
        trimmed.to_string()
    }
}
