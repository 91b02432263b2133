//! Error types for route dispatch.
//!
//! Every failure a dispatch can produce is a variant of [`Error`]. Errors that
//! come back from the remote side keep their status code, headers and raw body
//! so callers can inspect them without re-sending the request.

use http::{HeaderMap, StatusCode};

/// The main error type for route dispatch.
///
/// # Examples
///
/// ```no_run
/// use routeline::{CallOptions, Dispatcher, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let dispatcher = Dispatcher::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match dispatcher.call("get_user", CallOptions::new()).await {
///     Ok(response) => println!("Success: {}", response.status),
///     Err(Error::UnknownRoute(name)) => eprintln!("No route named {}", name),
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The route name was never registered.
    ///
    /// Nothing is sent and nothing is retried.
    #[error("Invalid route name: {0}")]
    UnknownRoute(String),

    /// A request body could not be serialized.
    ///
    /// Raised while building the request, before anything is sent.
    #[error("Failed to encode request: {0}")]
    Encoding(String),

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    ///
    /// No response was received for the attempt.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The attempt exceeded the configured per-attempt timeout.
    #[error("Request timed out")]
    Timeout,

    /// The final attempt returned a non-success status code.
    ///
    /// # Fields
    ///
    /// * `status` - The HTTP status code
    /// * `raw_response` - The raw response body
    /// * `headers` - The response headers
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// A request or response body could not be decoded as JSON for logging.
    ///
    /// Only produced by a [`RequestLogger`](crate::logger::RequestLogger) in
    /// strict mode. The dispatcher never returns it from a call.
    #[error("Failed to decode {section} body for logging: {serde_error}")]
    LogEncoding {
        /// Which part of the record failed (`"request"` or `"response"`)
        section: &'static str,
        /// The serde error message
        serde_error: String,
    },

    /// Failed to deserialize the response body into the expected type.
    ///
    /// # Fields
    ///
    /// * `raw_response` - The raw response body as a string
    /// * `serde_error` - The error message from serde
    /// * `status` - The HTTP status code of the response
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided.
    ///
    /// This covers invalid header names or values and a missing base URL.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if no response was received for the failed attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use routeline::Error;
    /// use http::StatusCode;
    ///
    /// assert!(Error::Timeout.is_transport_failure());
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     raw_response: String::new(),
    ///     headers: http::HeaderMap::new(),
    /// };
    /// assert!(!err.is_transport_failure());
    /// ```
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the response headers if this error has them.
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Error::HttpError { headers, .. } => Some(headers),
            _ => None,
        }
    }

    /// A short, stable name for the error variant.
    ///
    /// Used as the error kind in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownRoute(_) => "unknown_route",
            Error::Encoding(_) => "encoding",
            Error::Network(_) => "network",
            Error::Timeout => "timeout",
            Error::HttpError { .. } => "http",
            Error::LogEncoding { .. } => "log_encoding",
            Error::DeserializationFailed { .. } => "deserialization",
            Error::ConfigurationError(_) => "configuration",
            Error::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// A specialized `Result` type for route dispatch.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
