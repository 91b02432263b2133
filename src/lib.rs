//! # Routeline - named-route HTTP dispatch
//!
//! Routeline lets you describe the remote operations an application talks to
//! once, as named routes, and then call them by name. Each route fixes a method,
//! a path, default headers and default body options; each call may override
//! them. The dispatcher builds the concrete request, sends it with bounded
//! retries and writes one structured log record per call.
//!
//! ## Quick Start
//!
//! ```no_run
//! use routeline::{CallOptions, Dispatcher, RequestOptions, RouteDefinition, RouteMethod};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), routeline::Error> {
//!     let dispatcher = Dispatcher::builder()
//!         .base_url("https://api.example.com")?
//!         .max_retries(3)
//!         .retry_delay(Duration::from_millis(200))
//!         .default_header("User-Agent", "my-app/1.0")?
//!         .log_to_tracing()
//!         .build()?;
//!
//!     // Register routes once
//!     dispatcher
//!         .register(RouteDefinition::new("list_users", RouteMethod::Get, "/users")
//!             .with_options(RequestOptions::new().with_query_param("limit", 50)))
//!         .register(RouteDefinition::new("create_user", RouteMethod::Post, "/users")
//!             .with_log_name("users api"));
//!
//!     // Call them by name
//!     let users: Vec<User> = dispatcher
//!         .call("list_users", CallOptions::new().with_query_param("page", 2))
//!         .await?
//!         .json()?;
//!     println!("Fetched {} users", users.len());
//!
//!     let created = dispatcher
//!         .call("create_user", CallOptions::new().with_body(serde_json::json!({"name": "Alice"})))
//!         .await?;
//!     println!("Created: {} after {} attempt(s)", created.status, created.attempts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Building requests
//!
//! Body options are applied in a fixed order and a later one replaces an
//! earlier one: a JSON `body`, then `form_params`, then `multipart` parts. The
//! `Content-Type` header always matches the body actually sent. Query
//! parameters are independent of the body. See [`builder`] for details.
//!
//! ## Retries
//!
//! The default [`RetryPolicy`] retries 5xx responses with a linear delay
//! (`retry_delay * attempt`) until `max_retries` attempts have been made.
//! Failures without a response are returned immediately unless
//! [`DispatcherBuilder::retry_transport_errors`] is enabled. Plug in your own
//! [`RetryHook`] for anything else.
//!
//! ## Errors
//!
//! The final attempt's error is returned as is; a 5xx that survives all
//! retries arrives as [`Error::HttpError`] with its status, headers and body.
//!
//! ```no_run
//! use routeline::{CallOptions, Dispatcher, Error};
//!
//! # async fn example(dispatcher: Dispatcher) {
//! match dispatcher.call("list_users", CallOptions::new()).await {
//!     Ok(response) => println!("Success: {}", response.text()),
//!     Err(Error::HttpError { status, raw_response, .. }) => {
//!         eprintln!("HTTP error {}: {}", status, raw_response);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```

pub mod builder;
mod dispatcher;
mod error;
pub mod logger;
pub mod multipart;
mod options;
mod registry;
mod response;
pub mod retry;
mod route;
pub mod transport;

pub use builder::{BuiltRequest, RequestBuilder};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{Error, Result};
pub use logger::{LogRecord, LogSink, RequestLogger};
pub use options::{CallOptions, MultipartPart, RequestOptions};
pub use registry::RouteRegistry;
pub use response::Response;
pub use retry::{RetryDecision, RetryHook, RetryPolicy};
pub use route::{RouteConfig, RouteConfigOptions, RouteDefinition, RouteMethod};
pub use transport::{RawResponse, Transport};
