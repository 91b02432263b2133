//! The response returned from a route call.
//!
//! [`Response`] keeps the raw body alongside timing and retry information so
//! callers decide for themselves how to interpret it.

use crate::transport::RawResponse;
use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// The final response of a route call.
///
/// # Examples
///
/// ```no_run
/// use routeline::{CallOptions, Dispatcher};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), routeline::Error> {
/// let dispatcher = Dispatcher::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = dispatcher.call("get_user", CallOptions::new()).await?;
/// let user: User = response.json()?;
///
/// println!("User: {}", user.name);
/// println!("Request took {:?}", response.latency);
/// println!("Attempts: {}", response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The protocol version.
    pub version: Version,

    /// The raw response body.
    pub body: Bytes,

    /// Time from the first attempt until the final response, retry delays
    /// included.
    pub latency: Duration,

    /// The number of attempts made.
    ///
    /// `1` for calls that succeeded on the first try.
    pub attempts: usize,
}

impl Response {
    /// Creates a response from the transport's final attempt.
    pub fn from_raw(raw: RawResponse, latency: Duration, attempts: usize) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            version: raw.version,
            body: raw.body,
            latency,
            attempts,
        }
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] with the raw body if the body
    /// does not match `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use routeline::Response;
    /// # use http::{HeaderMap, StatusCode, Version};
    /// # use std::time::Duration;
    /// let response = Response {
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     version: Version::HTTP_11,
    ///     body: "[1, 2, 3]".into(),
    ///     latency: Duration::from_millis(12),
    ///     attempts: 1,
    /// };
    ///
    /// let numbers: Vec<u32> = response.json().unwrap();
    /// assert_eq!(numbers, vec![1, 2, 3]);
    /// assert!(response.json::<String>().is_err());
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::error!(
                error = %e,
                status = self.status.as_u16(),
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: self.text(),
                serde_error: e.to_string(),
                status: self.status,
            }
        })
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use routeline::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode, Version};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response {
    ///     status: StatusCode::OK,
    ///     headers,
    ///     version: Version::HTTP_11,
    ///     body: Default::default(),
    ///     latency: Duration::from_millis(100),
    ///     attempts: 1,
    /// };
    ///
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_keeps_transport_details() {
        let mut raw = RawResponse::new(StatusCode::ACCEPTED, "queued");
        raw.version = Version::HTTP_2;
        let response = Response::from_raw(raw, Duration::from_millis(40), 3);

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.version, Version::HTTP_2);
        assert_eq!(response.text(), "queued");
        assert!(response.was_retried());
    }

    #[test]
    fn json_failure_keeps_raw_body() {
        let raw = RawResponse::new(StatusCode::OK, "invalid json");
        let response = Response::from_raw(raw, Duration::ZERO, 1);

        match response.json::<serde_json::Value>() {
            Err(Error::DeserializationFailed {
                raw_response,
                status,
                ..
            }) => {
                assert_eq!(raw_response, "invalid json");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }
}
