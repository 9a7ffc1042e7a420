use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::opds::model::Feed;
use crate::opds::parser::{parse_catalog, ParseError};
use crate::util::{validate_url, UrlValidationError};

const ACCEPT_CATALOG: &str =
    "application/opds+json, application/atom+xml;q=0.9, application/json;q=0.8, */*;q=0.5";

/// Errors that can occur while retrieving a catalog page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The catalog URL failed validation (bad scheme, private address, etc.)
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server kept answering 429 Too Many Requests
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response ended before Content-Length bytes were received
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The body was not a readable catalog
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Limits applied to a single catalog fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each request attempt.
    pub timeout: Duration,
    /// Retries after the first attempt for 429, 5xx and truncated bodies.
    pub max_retries: u32,
    /// Maximum accepted body size in bytes.
    pub max_size: usize,
    /// First backoff delay; doubled on every retry.
    pub backoff_base: Duration,
    /// Allow localhost and private network addresses.
    pub allow_private_hosts: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            max_size: 10 * 1024 * 1024,
            backoff_base: Duration::from_secs(1),
            allow_private_hosts: false,
        }
    }
}

/// Raw catalog response.
#[derive(Debug, Clone)]
pub struct FetchedCatalog {
    /// Final URL after redirects; relative hrefs resolve against this.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Fetches a catalog page and parses it, resolving relative hrefs against
/// the final response URL.
///
/// # Errors
///
/// Any [`FetchError`] from [`fetch_catalog`], plus [`FetchError::Parse`]
/// when the body is not an OPDS document.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Feed, FetchError> {
    let fetched = fetch_catalog(client, url, options).await?;
    let feed = parse_catalog(&fetched.body, Some(&fetched.url))?;
    Ok(feed)
}

/// Retrieves the raw bytes of a catalog page.
///
/// # Behavior
///
/// - The URL is validated first; private hosts are refused unless
///   [`FetchOptions::allow_private_hosts`] is set
/// - Each attempt is bounded by [`FetchOptions::timeout`], once for the
///   response headers and once for the body
/// - 429 and 5xx responses are retried with exponential backoff, as are
///   bodies shorter than their Content-Length
/// - Other non-2xx statuses fail immediately
/// - Bodies larger than [`FetchOptions::max_size`] are rejected without
///   being buffered in full
pub async fn fetch_catalog(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<FetchedCatalog, FetchError> {
    let url = validate_url(url, options.allow_private_hosts)?;
    let mut retry_count = 0;

    loop {
        let request = client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_CATALOG))
            .send();
        let response = tokio::time::timeout(options.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)??;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= options.max_retries {
                return Err(if status.is_server_error() {
                    FetchError::HttpStatus(status.as_u16())
                } else {
                    FetchError::RateLimited(options.max_retries)
                });
            }

            let delay = backoff_delay(options.backoff_base, retry_count);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Catalog server busy, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // The body read is bounded separately from the headers
        let read = read_limited_bytes(response, options.max_size);
        let body = tokio::time::timeout(options.timeout, read)
            .await
            .map_err(|_| FetchError::Timeout)?;

        match body {
            Ok(body) => {
                tracing::debug!(
                    url = %final_url,
                    bytes = body.len(),
                    content_type = content_type.as_deref().unwrap_or("unknown"),
                    "Fetched catalog page"
                );
                return Ok(FetchedCatalog {
                    url: final_url,
                    content_type,
                    body,
                });
            }
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < options.max_retries =>
            {
                let delay = backoff_delay(options.backoff_base, retry_count);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
