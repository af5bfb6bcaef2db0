use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::rss::{self, RawDocument};

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur retrieving one feed document.
///
/// Transport failures and decode failures are distinct variants so logs can
/// tell a dead host from a feed that serves garbage, but callers treat both
/// the same way: abandon the source for this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the client-side timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body was not a well-formed RSS document
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Fetch one feed document and decode it.
///
/// Issues a single timed GET — no retries here; a failed source simply
/// rotates back through the least-recently-fetched ordering and is tried
/// again on a later cycle.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<RawDocument, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    rss::decode(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
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
