//! Route definitions.
//!
//! A route is a named template describing how to reach one remote operation:
//! an HTTP method, a path, default headers and default body options. Routes
//! are built once at configuration time and never mutated afterwards.

use crate::options::RequestOptions;
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The HTTP methods a route may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum RouteMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl RouteMethod {
    /// Returns the method as an [`http::Method`].
    pub fn as_method(&self) -> Method {
        match self {
            RouteMethod::Get => Method::GET,
            RouteMethod::Post => Method::POST,
            RouteMethod::Put => Method::PUT,
            RouteMethod::Delete => Method::DELETE,
        }
    }

    /// Returns the upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&Method> for RouteMethod {
    type Error = Error;

    fn try_from(method: &Method) -> Result<Self> {
        match *method {
            Method::GET => Ok(RouteMethod::Get),
            Method::POST => Ok(RouteMethod::Post),
            Method::PUT => Ok(RouteMethod::Put),
            Method::DELETE => Ok(RouteMethod::Delete),
            _ => Err(Error::ConfigurationError(format!(
                "Unsupported route method: {}",
                method
            ))),
        }
    }
}

/// A named, reusable request template.
///
/// # Examples
///
/// ```
/// use routeline::{RequestOptions, RouteDefinition, RouteMethod};
///
/// # fn example() -> Result<(), routeline::Error> {
/// let route = RouteDefinition::new("search", RouteMethod::Get, "/search")
///     .with_header("Accept", "application/json")?
///     .with_options(RequestOptions::new().with_query_param("limit", 20))
///     .with_log_name("search api");
///
/// assert_eq!(route.name, "search");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    /// Unique route name.
    pub name: String,

    /// Path template, resolved against the dispatcher's base URL.
    pub path: String,

    /// HTTP method.
    pub method: RouteMethod,

    /// Default headers for every call of this route.
    pub headers: HeaderMap,

    /// Default body and query options.
    pub options: RequestOptions,

    /// Name the route's calls are logged under.
    pub log_name: Option<String>,
}

impl RouteDefinition {
    /// Creates a route with no default headers or options.
    pub fn new(name: impl Into<String>, method: RouteMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            method,
            headers: HeaderMap::new(),
            options: RequestOptions::default(),
            log_name: None,
        }
    }

    /// Adds a default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default options.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the log name.
    pub fn with_log_name(mut self, log_name: impl Into<String>) -> Self {
        self.log_name = Some(log_name.into());
        self
    }
}

/// Serialized form of a route.
///
/// ```json
/// {
///   "name": "create_user",
///   "path": "/users",
///   "method": "POST",
///   "options": {"headers": {"Accept": "application/json"}, "body": {"role": "member"}},
///   "logName": "users api"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Unique route name.
    pub name: String,
    /// Path template.
    pub path: String,
    /// HTTP method.
    pub method: RouteMethod,
    /// Default headers and options.
    #[serde(default)]
    pub options: RouteConfigOptions,
    /// Name the route's calls are logged under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_name: Option<String>,
}

/// The `options` object of a [`RouteConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfigOptions {
    /// Default headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Body and query defaults.
    #[serde(flatten)]
    pub request: RequestOptions,
}

impl TryFrom<RouteConfig> for RouteDefinition {
    type Error = Error;

    fn try_from(config: RouteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.options.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        Ok(RouteDefinition {
            name: config.name,
            path: config.path,
            method: config.method,
            headers,
            options: config.options.request,
            log_name: config.log_name.filter(|name| !name.is_empty()),
        })
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}
