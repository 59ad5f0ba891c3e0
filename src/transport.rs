//! Outbound HTTP with per-attempt timeout and bounded retry.
//!
//! Every adapter goes through the [`Transport`] trait, so tests substitute a
//! canned implementation and never touch the network. [`HttpTransport`] is
//! the real one, built on `reqwest`. The transport does no caching; that is
//! the caller's job.

use log::warn;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Upper bound on the error-body excerpt carried by [`TransportError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 400;

/// Linear backoff step between retry attempts.
const BACKOFF_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum TransportError {
    /// Non-2xx response. Not retried; a deterministic status will not change
    /// on a second attempt. Carries a truncated body excerpt for diagnosis.
    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// No response within the per-attempt bound, after all retries.
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    /// Connection-level failure, after all retries.
    #[error("network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    /// The body was not the JSON the caller asked for.
    #[error("failed to decode JSON response from {0}")]
    JsonDecode(String, #[source] serde_json::Error),
}

/// Per-call transport knobs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Bound on a single attempt, not the whole call.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Extra request headers, e.g. a geocoder contact string.
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
            headers: Vec::new(),
        }
    }
}

/// The outbound-call seam. One GET per call; retry/backoff handled inside.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, TransportError>;

    async fn fetch_json(&self, url: &str, options: &FetchOptions) -> Result<Value, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, TransportError> {
        (**self).fetch_text(url, options).await
    }

    async fn fetch_json(&self, url: &str, options: &FetchOptions) -> Result<Value, TransportError> {
        (**self).fetch_json(url, options).await
    }
}

/// Real transport over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<String, TransportError> {
        retry_loop(url, options.retries, |_| self.attempt_once(url, options)).await
    }

    async fn attempt_once(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<String, TransportError> {
        let mut request = self.client.get(url).timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status,
                body: truncate_body(&body),
            });
        }
        Ok(body)
    }
}

impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, TransportError> {
        self.fetch_with_retry(url, options).await
    }

    async fn fetch_json(&self, url: &str, options: &FetchOptions) -> Result<Value, TransportError> {
        let body = self.fetch_with_retry(url, options).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::JsonDecode(url.to_string(), e))
    }
}

/// Drives `attempt` up to `1 + retries` times. Only network/timeout failures
/// retry, with linear backoff per attempt; a surfaced timeout carries the
/// total attempt count.
async fn retry_loop<F, Fut>(url: &str, retries: u32, mut attempt: F) -> Result<String, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<String, TransportError>>,
{
    let mut attempt_no: u32 = 0;
    loop {
        match attempt(attempt_no).await {
            Ok(body) => return Ok(body),
            Err(err) if is_retryable(&err) && attempt_no < retries => {
                attempt_no += 1;
                warn!("attempt {attempt_no} for {url} failed ({err}), retrying");
                sleep(BACKOFF_STEP * attempt_no).await;
            }
            Err(TransportError::Timeout { url, .. }) => {
                return Err(TransportError::Timeout {
                    url,
                    attempts: attempt_no + 1,
                });
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_retryable(err: &TransportError) -> bool {
    matches!(
        err,
        TransportError::Timeout { .. } | TransportError::Network(..)
    )
}

fn classify_reqwest_error(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            attempts: 1,
        }
    } else {
        TransportError::Network(url.to_string(), err)
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for tests: serves queued payloads in order and
    //! records every URL it was asked for.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) struct MockTransport {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn push_text(&self, body: impl Into<String>) {
            self.responses.lock().unwrap().push_back(Ok(body.into()));
        }

        pub fn push_error(&self, err: TransportError) {
            self.responses.lock().unwrap().push_back(Err(err));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        async fn fetch_text(
            &self,
            url: &str,
            _options: &FetchOptions,
        ) -> Result<String, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request to {url}"))
        }

        async fn fetch_json(
            &self,
            url: &str,
            options: &FetchOptions,
        ) -> Result<Value, TransportError> {
            let body = self.fetch_text(url, options).await?;
            serde_json::from_str(&body).map_err(|e| TransportError::JsonDecode(url.to_string(), e))
        }
    }
}
