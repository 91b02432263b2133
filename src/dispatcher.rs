//! Named-route dispatcher.
//!
//! The [`Dispatcher`] type is the main entry point: register routes once, then
//! call them by name. Use [`DispatcherBuilder`] to configure and create one.

use crate::{
    builder::{BuiltRequest, RequestBuilder},
    logger::{BodyDecoding, LogSink, RequestLogger, TracingSink, DEFAULT_LOG_NAME},
    options::CallOptions,
    registry::RouteRegistry,
    retry::{RetryHook, RetryPolicy},
    route::{RouteConfig, RouteDefinition},
    transport::{RawResponse, ReqwestTransport, RetryingTransport, Transport},
    Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Dispatches calls to named routes.
///
/// The dispatcher is cheap to clone; clones share the route registry, the
/// transport and its connection pool.
///
/// # Examples
///
/// ```no_run
/// use routeline::{CallOptions, Dispatcher, RouteDefinition, RouteMethod};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), routeline::Error> {
/// let dispatcher = Dispatcher::builder()
///     .base_url("https://api.example.com")?
///     .max_retries(3)
///     .retry_delay(Duration::from_millis(200))
///     .default_header("User-Agent", "my-app/1.0")?
///     .log_to_tracing()
///     .build()?;
///
/// dispatcher.register(
///     RouteDefinition::new("create_user", RouteMethod::Post, "/users")
///         .with_header("Accept", "application/json")?
///         .with_log_name("users api"),
/// );
///
/// let response = dispatcher
///     .call(
///         "create_user",
///         CallOptions::new().with_body(serde_json::json!({"name": "Alice"})),
///     )
///     .await?;
/// println!("Created: {}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    base_url: Url,
    registry: Arc<RouteRegistry>,
    builder: RequestBuilder,
    transport: RetryingTransport,
    logger: Option<RequestLogger>,
    http_errors: bool,
    default_log_name: String,
}

impl Dispatcher {
    /// Creates a new `DispatcherBuilder`.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Registers a route, replacing any route with the same name.
    pub fn register(&self, definition: RouteDefinition) -> &Self {
        self.inner.registry.register(definition);
        self
    }

    /// Converts and registers a serialized route.
    ///
    /// # Errors
    ///
    /// Returns an error if the route's headers are invalid.
    pub fn register_config(&self, config: RouteConfig) -> Result<&Self> {
        self.inner.registry.register_config(config)?;
        Ok(self)
    }

    /// Names of all registered routes.
    pub fn route_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    /// The route registry.
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.inner.registry
    }

    /// The base URL route paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Builds the request a call would send, without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoute`] or [`Error::Encoding`].
    pub fn build_request(&self, name: &str, options: &CallOptions) -> Result<BuiltRequest> {
        let route = self.inner.registry.resolve(name)?;
        self.inner.builder.build(&route, options)
    }

    /// Calls a registered route.
    ///
    /// Resolves the route, builds the request, sends it (retrying according to
    /// the retry policy), logs the final attempt once and returns its result.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownRoute`] if no route has this name; nothing is sent.
    /// * [`Error::Encoding`] if the body cannot be serialized; nothing is sent.
    /// * The final attempt's error, unchanged: [`Error::HttpError`] for a 4xx
    ///   or 5xx response (unless `http_errors(false)`), otherwise
    ///   [`Error::Network`] or [`Error::Timeout`].
    pub async fn call(&self, name: &str, options: CallOptions) -> Result<Response> {
        let route = self.inner.registry.resolve(name)?;
        let request = self.inner.builder.build(&route, &options)?;

        let log_name = options
            .log_name
            .as_deref()
            .or(route.log_name.as_deref())
            .unwrap_or(&self.inner.default_log_name);

        tracing::debug!(
            route = %route.name,
            method = %request.method,
            uri = %request.uri,
            "Dispatching route"
        );

        let start_time = Instant::now();
        let outcome = self.inner.transport.execute(&request).await;
        let latency = start_time.elapsed();

        let result = match outcome.result {
            Ok(raw) => match self.status_error(&raw) {
                Some(error) => Err((Some(raw), error)),
                None => Ok(raw),
            },
            Err(error) => Err((None, error)),
        };

        if let Some(logger) = &self.inner.logger {
            let logged = match &result {
                Ok(raw) => logger.log_attempt(log_name, &request, Some(raw), None),
                Err((raw, error)) => {
                    logger.log_attempt(log_name, &request, raw.as_ref(), Some(error))
                }
            };

            if let Err(e) = logged {
                tracing::error!(
                    error = %e,
                    route = %route.name,
                    "Failed to write request log record"
                );
            }
        }

        match result {
            Ok(raw) => {
                tracing::info!(
                    route = %route.name,
                    status = raw.status.as_u16(),
                    latency_ms = latency.as_millis(),
                    attempts = outcome.attempts,
                    "Received HTTP response"
                );
                Ok(Response::from_raw(raw, latency, outcome.attempts))
            }
            Err((_, error)) => {
                tracing::warn!(
                    route = %route.name,
                    error = %error,
                    attempts = outcome.attempts,
                    "Route call failed"
                );
                Err(error)
            }
        }
    }

    fn status_error(&self, raw: &RawResponse) -> Option<Error> {
        if self.inner.http_errors {
            raw.error_for_status()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.inner.base_url.as_str())
            .field("routes", &self.inner.registry.len())
            .field("http_errors", &self.inner.http_errors)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Dispatcher`].
///
/// # Examples
///
/// ```no_run
/// use routeline::{DispatcherBuilder, logger::BodyDecoding};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), routeline::Error> {
/// let dispatcher = DispatcherBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .max_retries(4)
///     .retry_delay(Duration::from_millis(250))
///     .default_header("User-Agent", "my-app/1.0")?
///     .log_to_tracing()
///     .log_body_decoding(BodyDecoding::Lenient)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DispatcherBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    max_retries: usize,
    retry_delay: Duration,
    retry_transport_errors: bool,
    retry_hook: Option<Arc<dyn RetryHook>>,
    timeout: Option<Duration>,
    http_errors: bool,
    log_sink: Option<Arc<dyn LogSink>>,
    body_decoding: BodyDecoding,
    default_log_name: String,
    transport: Option<Arc<dyn Transport>>,
    registry: Option<Arc<RouteRegistry>>,
}

impl DispatcherBuilder {
    /// Creates a new `DispatcherBuilder` with default settings.
    ///
    /// By default nothing is retried, 4xx and 5xx responses are errors and
    /// nothing is logged.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            max_retries: 0,
            retry_delay: Duration::ZERO,
            retry_transport_errors: false,
            retry_hook: None,
            timeout: None,
            http_errors: true,
            log_sink: None,
            body_decoding: BodyDecoding::default(),
            default_log_name: DEFAULT_LOG_NAME.to_string(),
            transport: None,
            registry: None,
        }
    }

    /// Sets the base URL route paths are resolved against.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a header sent with every route call.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the attempt budget of the default [`RetryPolicy`].
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay unit of the default [`RetryPolicy`].
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Also retry attempts that failed without a response.
    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.retry_transport_errors = enabled;
        self
    }

    /// Uses `policy` instead of the one assembled from `max_retries` and
    /// `retry_delay`.
    pub fn retry_policy(self, policy: RetryPolicy) -> Self {
        self.retry_hook(Arc::new(policy))
    }

    /// Uses a custom retry hook.
    pub fn retry_hook(mut self, hook: Arc<dyn RetryHook>) -> Self {
        self.retry_hook = Some(hook);
        self
    }

    /// Sets the timeout applied to each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether 4xx and 5xx responses are returned as [`Error::HttpError`].
    ///
    /// Defaults to `true`. When `false`, every response is returned as a
    /// [`Response`] and the caller interprets the status.
    pub fn http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = enabled;
        self
    }

    /// Logs every call to `sink`.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Logs every call as a `tracing` event.
    pub fn log_to_tracing(self) -> Self {
        self.log_sink(Arc::new(TracingSink))
    }

    /// Sets how bodies are decoded for log records.
    pub fn log_body_decoding(mut self, decoding: BodyDecoding) -> Self {
        self.body_decoding = decoding;
        self
    }

    /// Sets the log name used when neither the call nor the route has one.
    pub fn default_log_name(mut self, log_name: impl Into<String>) -> Self {
        self.default_log_name = log_name.into();
        self
    }

    /// Sends requests through a custom transport instead of `reqwest`.
    ///
    /// The retry hook still applies around it.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares an existing route registry.
    pub fn registry(mut self, registry: Arc<RouteRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the configured `Dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided.
    pub fn build(self) -> Result<Dispatcher> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let retry_hook = self.retry_hook.unwrap_or_else(|| {
            Arc::new(
                RetryPolicy::new(self.max_retries, self.retry_delay)
                    .retry_transport_errors(self.retry_transport_errors),
            )
        });

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(ReqwestTransport::new(base_url.clone(), self.timeout))
        });

        let body_decoding = self.body_decoding;
        let host = base_url.as_str().trim_end_matches('/').to_string();
        let logger = self
            .log_sink
            .map(|sink| RequestLogger::new(sink, host).with_body_decoding(body_decoding));

        Ok(Dispatcher {
            inner: Arc::new(DispatcherInner {
                base_url,
                registry: self.registry.unwrap_or_default(),
                builder: RequestBuilder::new(self.default_headers),
                transport: RetryingTransport::new(transport, retry_hook),
                logger,
                http_errors: self.http_errors,
                default_log_name: self.default_log_name,
            }),
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
