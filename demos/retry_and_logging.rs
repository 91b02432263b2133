//! Retries, error handling and structured request logs.
//!
//! This example shows how to:
//! - Configure the linear retry policy
//! - Capture one log record per call with a custom sink
//! - Inspect the final error of a call that exhausted its retries
//!
//! Run with: `cargo run --example retry_and_logging`

use routeline::logger::{LogRecord, LogSink};
use routeline::{CallOptions, Dispatcher, Error, RouteDefinition, RouteMethod};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Prints each record as pretty JSON.
struct StdoutSink;

impl LogSink for StdoutSink {
    fn log(&self, level: Level, log_name: &str, record: &LogRecord) {
        match serde_json::to_string_pretty(record) {
            Ok(rendered) => println!("[{}] {}\n{}", level, log_name, rendered),
            Err(e) => eprintln!("[{}] {}: could not render record: {}", level, log_name, e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("routeline=info,retry_and_logging=info")
        .init();

    let dispatcher = Dispatcher::builder()
        .base_url("https://httpbin.org")?
        .max_retries(3)
        .retry_delay(Duration::from_millis(200))
        .timeout(Duration::from_secs(10))
        .log_sink(Arc::new(StdoutSink))
        .build()?;

    dispatcher
        .register(
            RouteDefinition::new("echo", RouteMethod::Post, "/anything")
                .with_log_name("echo"),
        )
        .register(RouteDefinition::new("always_503", RouteMethod::Get, "/status/503"))
        .register(RouteDefinition::new("not_found", RouteMethod::Get, "/status/404"));

    println!("=== Successful call ===");
    let response = dispatcher
        .call(
            "echo",
            CallOptions::new()
                .with_body(serde_json::json!({"hello": "world"}))
                .with_query_param("source", "demo"),
        )
        .await?;
    println!("Status: {}, attempts: {}", response.status, response.attempts);
    println!();

    println!("=== Server error, retried until the budget is spent ===");
    match dispatcher.call("always_503", CallOptions::new()).await {
        Ok(response) => println!("Unexpected success: {}", response.status),
        Err(Error::HttpError { status, .. }) => {
            println!("Gave up with status {} after 3 attempts (waited 200ms + 400ms)", status);
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Client error, never retried ===");
    if let Err(e) = dispatcher.call("not_found", CallOptions::new()).await {
        println!("Failed immediately: {} (status {:?})", e, e.status());
    }

    Ok(())
}
