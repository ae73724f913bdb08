//! HTTP Fetcher: GET with a timeout, up to 5 redirects, identity encoding.
//!
//! Grounded on the teacher's `HttpIngestor` (reqwest client + fixed
//! headers + single overall deadline), generalized to carry the typed
//! redirect/timeout/status error taxonomy spec.md §4.1 requires.

use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::{debug, warn};

use crate::error::FetchError;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 5;

/// Performs GET requests with a fixed desktop browser identity and a
/// single overall deadline covering connect + read + all redirects.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    /// GET `url`, failing after `timeout_ms` regardless of how much of
    /// that time was spent on redirects.
    pub async fn fetch(&self, url: &str, timeout_ms: u64) -> Result<String, FetchError> {
        debug!(url = %url, timeout_ms, "http fetch starting");

        let request = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Accept-Encoding", "identity")
            .header("Connection", "close")
            .timeout(Duration::from_millis(timeout_ms));

        let response = request.send().await.map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "fetch returned non-2xx status");
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response.text().await.map_err(|e| classify_send_error(url, e))
    }
}

fn classify_send_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if e.is_redirect() {
        // reqwest surfaces "too many redirects" as a redirect-policy error.
        FetchError::TooManyRedirects { url: url.to_string() }
    } else {
        FetchError::DnsOrConnect {
            url: url.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_successful_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let body = fetcher
            .fetch(&format!("{}/ok", server.uri()), 5_000)
            .await
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn non_2xx_status_is_an_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()), 5_000)
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch(&format!("{}/slow", server.uri()), 50)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }
}
