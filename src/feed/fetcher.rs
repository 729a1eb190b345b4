use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use crate::config::Config;
use crate::util::validate_url;

/// Errors that can occur while retrieving a feed document.
///
/// Kept apart from [`ParseError`](crate::feed::ParseError) so callers can tell
/// "could not reach the server" from "the server returned garbage".
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL is not an absolute http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, transport timeout, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {status} {reason}")]
    HttpStatus { status: u16, reason: String },
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// HTTP status code, when the failure was a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Retrieves raw feed documents through a relay endpoint.
///
/// The request URL is the relay prefix followed by the feed URL verbatim,
/// e.g. `https://relay.example/fetch/https://site.example/rss`. An empty
/// prefix fetches the feed URL directly.
///
/// One GET per call: no retries, no caching. Any timeout is a property of
/// the `reqwest::Client` handed in.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    relay_prefix: String,
    max_feed_bytes: usize,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, relay_prefix: impl Into<String>, max_feed_bytes: usize) -> Self {
        Self {
            client,
            relay_prefix: relay_prefix.into(),
            max_feed_bytes,
        }
    }

    /// Builds the HTTP client from configuration (user agent, optional timeout).
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder.build()?;
        Ok(Self::new(
            client,
            config.relay_prefix.clone(),
            config.max_feed_bytes,
        ))
    }

    pub fn relay_prefix(&self) -> &str {
        &self.relay_prefix
    }

    /// The URL actually requested for `feed_url`.
    pub fn request_url(&self, feed_url: &str) -> String {
        format!("{}{}", self.relay_prefix, feed_url)
    }

    /// Fetches `url` through the relay and returns the response body as text.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - `url` is not an absolute http(s) URL
    /// - [`FetchError::Network`] - Connection, TLS, DNS or transport timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded `max_feed_bytes`
    /// - [`FetchError::IncompleteResponse`] - Body shorter than its Content-Length
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let validated = validate_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let request_url = self.request_url(url.trim());

        tracing::debug!(url = %validated, request = %request_url, "Fetching feed");

        let response = self.client.get(&request_url).send().await.map_err(|e| {
            tracing::warn!(url = %validated, error = %e, "Feed request failed");
            FetchError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %validated, status = %status, "Feed request returned error status");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = read_limited_bytes(response, self.max_feed_bytes).await?;
        tracing::debug!(url = %validated, bytes = bytes.len(), "Fetched feed");

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    const LIMIT: usize = 10 * 1024 * 1024;

    fn relay_fetcher(server: &MockServer) -> Fetcher {
        Fetcher::new(reqwest::Client::new(), format!("{}/fetch/", server.uri()), LIMIT)
    }

    #[tokio::test]
    async fn test_fetch_through_relay() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fetch/https://example.com/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = relay_fetcher(&mock_server);
        let body = fetcher.fetch("https://example.com/feed.xml").await.unwrap();
        assert_eq!(body, VALID_RSS);
    }

    #[tokio::test]
    async fn test_direct_fetch_with_empty_prefix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(reqwest::Client::new(), "", LIMIT);
        let body = fetcher
            .fetch(&format!("{}/rss", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, VALID_RSS);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = relay_fetcher(&mock_server)
            .fetch("https://example.com/missing.xml")
            .await;
        match result.unwrap_err() {
            FetchError::HttpStatus { status: 404, reason } => assert_eq!(reason, "Not Found"),
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = relay_fetcher(&mock_server)
            .fetch("https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_makes_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = relay_fetcher(&mock_server)
            .fetch("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        // Port 1 is reserved and nothing listens on it in test environments
        let fetcher = Fetcher::new(reqwest::Client::new(), "", LIMIT);
        let err = fetcher.fetch("http://127.0.0.1:1/feed").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_body_over_limit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(reqwest::Client::new(), format!("{}/", mock_server.uri()), 1024);
        let err = fetcher.fetch("https://example.com/big").await.unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge));
    }

    #[test]
    fn test_request_url_concatenates_prefix() {
        let fetcher = Fetcher::new(reqwest::Client::new(), "https://relay.test/fetch/", LIMIT);
        assert_eq!(
            fetcher.request_url("https://example.com/rss"),
            "https://relay.test/fetch/https://example.com/rss"
        );
    }

    #[test]
    fn test_from_config_uses_relay_prefix() {
        let config = Config {
            relay_prefix: "https://relay.test/".to_string(),
            timeout_secs: 5,
            ..Config::default()
        };
        let fetcher = Fetcher::from_config(&config).unwrap();
        assert_eq!(fetcher.relay_prefix(), "https://relay.test/");
    }
}
