use crate::feed::parser::{parse_feed, Article};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Total attempts per feed, including the first one.
const MAX_ATTEMPTS: u32 = 5;
/// Per-request timeout. Keeps one slow feed from stalling a poll cycle.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Some publishers reject unknown clients, so we present a browser UA.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Errors that can occur while fetching and parsing one feed.
///
/// These never escape the fetcher's public surface; they exist to drive
/// the retry decision and to produce a precise log line on degradation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

impl FetchError {
    /// Returns true if this error is transient and the attempt should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::HttpStatus(status) => *status >= 500 || *status == 429,
            FetchError::Parse(_) | FetchError::ResponseTooLarge => false,
        }
    }
}

/// Fetch one feed URL and return its articles.
///
/// Degraded, never failing: transient errors are retried with exponential
/// backoff (1s, 2s, 4s, 8s) up to [`MAX_ATTEMPTS`] total attempts, and any
/// terminal outcome short of success logs a warning and yields an empty
/// vec. Callers treat an empty result as "nothing new", which keeps one
/// broken feed from taking down its siblings in the same cycle.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Vec<Article> {
    match fetch_with_retry(client, url).await {
        Ok(articles) => articles,
        Err(e) => {
            tracing::warn!(feed = %url, error = %e, "Feed fetch degraded to empty result");
            Vec::new()
        }
    }
}

async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<Article>, FetchError> {
    let mut attempt = 0;

    loop {
        match try_fetch(client, url).await {
            Ok(articles) => return Ok(articles),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = 1u64 << attempt; // 1s, 2s, 4s, 8s
                tracing::warn!(
                    feed = %url,
                    error = %e,
                    retry = attempt + 1,
                    delay_secs = delay,
                    "Transient fetch error, backing off"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn try_fetch(client: &reqwest::Client, url: &str) -> Result<Vec<Article>, FetchError> {
    let response = tokio::time::timeout(
        REQUEST_TIMEOUT,
        client.get(url).header("User-Agent", USER_AGENT).send(),
    )
    .await
    .map_err(|_| FetchError::Timeout)?
    .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    // Parse failure is treated exactly like a fetch failure upstream
    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
