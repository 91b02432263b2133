//! Transports that put built requests on the wire.
//!
//! [`Transport`] performs a single attempt. [`RetryingTransport`] wraps any
//! transport and consults a [`RetryHook`] between attempts. The default
//! transport, [`ReqwestTransport`], builds its `reqwest::Client` on first use
//! and reuses it afterwards.

use crate::builder::BuiltRequest;
use crate::retry::RetryHook;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// A response as received from the transport, before any status handling.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Protocol version.
    pub version: Version,
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            version: Version::HTTP_11,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts a client or server error status into [`Error::HttpError`].
    pub fn error_for_status(&self) -> Option<Error> {
        if self.status.is_client_error() || self.status.is_server_error() {
            Some(Error::HttpError {
                status: self.status,
                raw_response: self.text(),
                headers: self.headers.clone(),
            })
        } else {
            None
        }
    }
}

/// Sends one attempt of a built request.
///
/// Implementations return a [`RawResponse`] for every status code and an
/// error only when no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request once.
    async fn send(&self, request: &BuiltRequest) -> Result<RawResponse>;
}

/// A [`Transport`] backed by `reqwest`.
///
/// The underlying client is created lazily; concurrent first calls share a
/// single initialization.
#[derive(Debug)]
pub struct ReqwestTransport {
    base_url: Url,
    timeout: Option<Duration>,
    client: OnceCell<reqwest::Client>,
}

impl ReqwestTransport {
    /// Creates a transport resolving request URIs against `base_url`.
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Self {
        Self {
            base_url,
            timeout,
            client: OnceCell::new(),
        }
    }

    /// The base URL request URIs are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!(base_url = %self.base_url, "Building HTTP client");
                reqwest::Client::builder().build().map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })
            })
            .await
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &BuiltRequest) -> Result<RawResponse> {
        let url = self.base_url.join(&request.uri)?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            "Executing HTTP request"
        );

        let mut builder = self
            .client()
            .await?
            .request(request.method.clone(), url)
            .headers(request.headers.clone());

        if !request.body.is_empty() {
            builder = builder.body(request.body.to_bytes());
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let version = response.version();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(RawResponse {
            version,
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

/// The result of sending a request through a [`RetryingTransport`].
#[derive(Debug)]
pub struct Attempts {
    /// The outcome of the last attempt.
    pub result: Result<RawResponse>,
    /// How many attempts were made.
    pub attempts: usize,
}

/// Applies a [`RetryHook`] around an inner [`Transport`].
pub struct RetryingTransport {
    inner: Arc<dyn Transport>,
    hook: Arc<dyn RetryHook>,
}

impl RetryingTransport {
    /// Wraps `inner`, asking `hook` after every attempt whether to go again.
    pub fn new(inner: Arc<dyn Transport>, hook: Arc<dyn RetryHook>) -> Self {
        Self { inner, hook }
    }

    /// Sends the request until the hook stops retrying.
    ///
    /// The returned result is that of the last attempt, unchanged.
    pub async fn execute(&self, request: &BuiltRequest) -> Attempts {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = self.inner.send(request).await;

            let decision = match &result {
                Ok(response) => self.hook.decide(attempt, Some(response.status), None),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        method = %request.method,
                        uri = %request.uri,
                        "Request attempt failed"
                    );
                    self.hook.decide(attempt, None, Some(e))
                }
            };

            if !decision.should_retry {
                return Attempts {
                    result,
                    attempts: attempt,
                };
            }

            tracing::info!(
                delay_ms = decision.delay.as_millis(),
                attempt = attempt,
                status = result.as_ref().ok().map(|r| r.status.as_u16()),
                "Retrying request after delay"
            );

            tokio::time::sleep(decision.delay).await;
        }
    }
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport").finish_non_exhaustive()
    }
}
