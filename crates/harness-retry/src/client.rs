//! Retrying HTTP client implementation.

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use harness_common::{Error, Result};

/// Fixed delay between attempts. No backoff, no jitter: the managed
/// server's startup time, not network congestion, is what is being waited
/// out.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Statuses accepted as success. 202 is the flush endpoint's normal
/// answer; 410 is served by endpoints that have been retired but still
/// acknowledge the call.
const SUCCESS_STATUSES: [u16; 3] = [200, 202, 410];

/// Method, content type, and body for a single retried call.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Option<Bytes>,
}

impl HttpOptions {
    /// A plain GET request.
    pub fn get() -> Self {
        Self::default()
    }

    /// A POST request with no body.
    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    /// A POST request carrying a JSON body.
    pub fn post_json<T: Serialize>(payload: &T) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            content_type: Some("application/json".to_string()),
            body: Some(Bytes::from(serde_json::to_vec(payload)?)),
        })
    }
}

/// A fully buffered response from a successful attempt.
#[derive(Debug, Clone)]
pub struct RetryResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RetryResponse {
    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as text, lossily if it is not valid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client that retries on transient failure with a fixed delay.
///
/// Stateless with respect to the supervisor: it owns no process-related
/// entity and has no side effects beyond the network call itself.
#[derive(Clone)]
pub struct RetryingClient {
    client: Client<HttpConnector, Full<Bytes>>,
    delay: Duration,
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryingClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            delay: RETRY_DELAY,
        }
    }

    /// Overrides the inter-attempt delay. Intended for tests that want to
    /// run a large attempt budget quickly.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Issues the call, retrying until a response with an accepted status
    /// arrives or `max_attempts` attempts have failed.
    ///
    /// Any network-level failure (connection refused, reset, timeout) and
    /// any status outside the accepted set counts as a retryable failure.
    /// On exhaustion the last observed failure is wrapped in
    /// [`Error::MaxAttemptsExceeded`].
    pub async fn request(
        &self,
        url: &str,
        options: &HttpOptions,
        max_attempts: u32,
    ) -> Result<RetryResponse> {
        if max_attempts == 0 {
            return Err(Error::validation("max_attempts must be at least 1"));
        }
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::validation(format!("invalid URL {url}: {e}")))?;

        // Bounded loop rather than recursion: attempt budgets can be large
        // in slow-starting test environments.
        let mut last = String::new();
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.delay).await;
            }
            match self.attempt(&uri, options).await {
                Ok(response) => {
                    debug!(%uri, attempt, status = response.status.as_u16(), "request succeeded");
                    return Ok(response);
                }
                Err(failure) => {
                    debug!(%uri, attempt, max_attempts, %failure, "request attempt failed");
                    last = failure;
                }
            }
        }

        warn!(%uri, max_attempts, %last, "attempt budget exhausted");
        Err(Error::max_attempts_exceeded(max_attempts, last))
    }

    async fn attempt(
        &self,
        uri: &Uri,
        options: &HttpOptions,
    ) -> std::result::Result<RetryResponse, String> {
        let mut builder = Request::builder().method(options.method.clone()).uri(uri.clone());
        if let Some(content_type) = &options.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(Full::new(options.body.clone().unwrap_or_default()))
            .map_err(|e| e.to_string())?;

        let response = self.client.request(request).await.map_err(|e| e.to_string())?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| e.to_string())?
            .to_bytes();

        if SUCCESS_STATUSES.contains(&status.as_u16()) {
            Ok(RetryResponse { status, body })
        } else {
            Err(format!("Unable to reach server, HTTP {}", status.as_u16()))
        }
    }
}
