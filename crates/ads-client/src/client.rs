//! Raw HTTP layer: one transport, one retry loop.
//!
//! [`AdsHttpClient`] knows nothing about credentials, profiles or caching.
//! It sends fully built requests, classifies the outcome and retries the
//! transient classes (429, 5xx, network) under a [`RetryPolicy`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::RequestMethod;
use crate::response::{parse_error_response, Response};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// A request ready to go on the wire.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: RequestMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Header values carry the bearer token.
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &names)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .finish()
    }
}

impl HttpRequest {
    pub fn new(method: RequestMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP client for the Advertising API with built-in retry and error classification.
#[derive(Debug, Clone)]
pub struct AdsHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl AdsHttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self {
            inner,
            config,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A fresh attempt budget for one logical request.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry.clone())
    }

    /// Execute with retries, drawing attempts from `policy`.
    ///
    /// Returns the response on 2xx and a classified error otherwise. A 401 is
    /// returned immediately as [`ErrorKind::Authentication`] without spending
    /// the policy, so the caller can refresh and continue with the same budget.
    #[instrument(skip(self, request, policy), fields(method = %request.method, path = %request.url.path()))]
    pub async fn execute(&self, request: &HttpRequest, policy: &mut RetryPolicy) -> Result<Response> {
        loop {
            let attempt = policy.attempts();

            let err = match self.send_once(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    let body = String::from_utf8_lossy(response.bytes());
                    parse_error_response(response.status(), &body, response.retry_after(), attempt)
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            match policy.next_delay(err.retry_after()) {
                Some(delay) => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Request failed, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => return Err(exhausted(err, attempt)),
            }
        }
    }

    /// GET an absolute URL without credentials (presigned report downloads).
    pub async fn fetch_external(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url)?;
        let request = HttpRequest::new(RequestMethod::Get, url);
        let mut policy = self.retry_policy();
        self.execute(&request, &mut policy).await
    }

    /// Send a single attempt. Non-success statuses are returned as `Ok`.
    async fn send_once(&self, request: &HttpRequest) -> Result<Response> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), request.url.clone());

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(ref body) = request.body {
            req = req.body(body.clone());
        }

        if self.config.enable_tracing {
            debug!(method = %request.method, url = %request.url, "Sending request");
        }

        let response = req.send().await?;
        let status = response.status().as_u16();

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?;

        if self.config.enable_tracing {
            if (200..300).contains(&status) {
                debug!(status, content_length = body.len(), "Response received");
            } else {
                info!(status, content_length = body.len(), "Non-success response");
            }
        }

        Ok(Response::from_network(status, headers, body))
    }
}

/// Final error once the attempt budget is spent.
fn exhausted(err: Error, attempts: u32) -> Error {
    let kind = match err.kind {
        ErrorKind::Network(message) => ErrorKind::Server {
            status: None,
            message,
            attempts,
        },
        kind => kind,
    };
    Error {
        kind,
        source: err.source,
    }
}
