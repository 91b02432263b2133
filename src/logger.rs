//! Structured request logging.
//!
//! [`RequestLogger`] renders one [`LogRecord`] per call, covering the request,
//! the response (when one was received) and the error (when the call failed),
//! and hands it to a [`LogSink`]. Calls without an error are logged at `INFO`,
//! failed calls at `WARN`.
//!
//! Bodies are decoded as JSON so they show up structured in the record. In
//! [`BodyDecoding::Lenient`] mode a body that is not JSON is captured as text;
//! in [`BodyDecoding::Strict`] mode it is reported as
//! [`Error::LogEncoding`] and no record is emitted.

use crate::builder::{Body, BuiltRequest};
use crate::transport::RawResponse;
use crate::{Error, Result};
use http::{HeaderMap, Version};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Level;

/// The log name used when neither the call nor the route names one.
pub const DEFAULT_LOG_NAME: &str = "Request & Response";

/// How bodies are decoded for the log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyDecoding {
    /// Fall back to raw text when a body is not valid JSON.
    #[default]
    Lenient,
    /// Fail with [`Error::LogEncoding`] when a body is not valid JSON.
    Strict,
}

/// A body as it appears in a log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoggedBody {
    /// A body that decoded as JSON.
    Json(Value),
    /// A body captured verbatim.
    Text(String),
    /// A multipart body, summarized by its field names.
    Parts {
        /// Field names in body order.
        multipart: Vec<String>,
    },
}

/// The request section of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSection {
    /// Protocol version, e.g. `1.1`.
    pub http_version: &'static str,
    /// The dispatcher's base URL.
    pub host: String,
    /// Request path without the query string.
    pub path: String,
    /// Request headers.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Decoded request body.
    pub body: Option<LoggedBody>,
}

/// The response section of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSection {
    /// Protocol version, e.g. `1.1`.
    pub http_version: &'static str,
    /// The dispatcher's base URL.
    pub host: String,
    /// Response headers.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Decoded response body.
    pub body: Option<LoggedBody>,
    /// Status code.
    pub status_code: u16,
}

/// The error section of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSection {
    /// The error message.
    pub message: String,
    /// HTTP status code carried by the error, if any.
    pub code: Option<u16>,
    /// The error variant, see [`Error::kind`].
    pub kind: &'static str,
    /// The route whose call failed.
    pub route: String,
    /// Method and URI of the failed request, e.g. `GET /users?page=2`.
    pub request: String,
}

/// One structured record per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// What was sent.
    #[serde(rename = "Request")]
    pub request: RequestSection,
    /// What came back, if anything did.
    #[serde(rename = "Response", skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSection>,
    /// Why the call failed, if it did.
    #[serde(rename = "Errors", skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSection>,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Writes one record.
    fn log(&self, level: Level, log_name: &str, record: &LogRecord);
}

/// Emits records as `tracing` events with the record rendered as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, log_name: &str, record: &LogRecord) {
        let rendered = serde_json::to_string(record)
            .unwrap_or_else(|e| format!("<unrenderable record: {}>", e));

        if level == Level::ERROR {
            tracing::error!(log_name = %log_name, record = %rendered, "{}", log_name);
        } else if level == Level::WARN {
            tracing::warn!(log_name = %log_name, record = %rendered, "{}", log_name);
        } else if level == Level::INFO {
            tracing::info!(log_name = %log_name, record = %rendered, "{}", log_name);
        } else {
            tracing::debug!(log_name = %log_name, record = %rendered, "{}", log_name);
        }
    }
}

/// A record captured by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLog {
    /// Severity.
    pub level: Level,
    /// Log name.
    pub log_name: String,
    /// The record.
    pub record: LogRecord,
}

/// Keeps records in memory. Useful in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CapturedLog>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far.
    pub fn records(&self) -> Vec<CapturedLog> {
        self.records.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, log_name: &str, record: &LogRecord) {
        self.records.lock().push(CapturedLog {
            level,
            log_name: log_name.to_string(),
            record: record.clone(),
        });
    }
}

/// Renders and emits request log records.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    host: String,
    decoding: BodyDecoding,
}

impl RequestLogger {
    /// Creates a logger writing to `sink`, reporting `host` in every record.
    pub fn new(sink: Arc<dyn LogSink>, host: impl Into<String>) -> Self {
        Self {
            sink,
            host: host.into(),
            decoding: BodyDecoding::default(),
        }
    }

    /// Sets the body decoding mode.
    pub fn with_body_decoding(mut self, decoding: BodyDecoding) -> Self {
        self.decoding = decoding;
        self
    }

    /// The body decoding mode.
    pub fn body_decoding(&self) -> BodyDecoding {
        self.decoding
    }

    /// Builds the record for a call without emitting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogEncoding`] in strict mode if a body is not JSON.
    pub fn record(
        &self,
        request: &BuiltRequest,
        response: Option<&RawResponse>,
        error: Option<&Error>,
    ) -> Result<LogRecord> {
        let request_body = match &request.body {
            Body::Empty => None,
            Body::Bytes(bytes) => self.decode_body("request", bytes)?,
            Body::Multipart(form) => Some(LoggedBody::Parts {
                multipart: form.part_names(),
            }),
        };

        let response = match response {
            Some(response) => Some(ResponseSection {
                http_version: http_version(response.version),
                host: self.host.clone(),
                headers: headers_to_map(&response.headers),
                body: self.decode_body("response", &response.body)?,
                status_code: response.status.as_u16(),
            }),
            None => None,
        };

        Ok(LogRecord {
            request: RequestSection {
                http_version: http_version(request.version),
                host: self.host.clone(),
                path: request.path().to_string(),
                headers: headers_to_map(&request.headers),
                body: request_body,
            },
            response,
            error: error.map(|e| ErrorSection {
                message: e.to_string(),
                code: e.status().map(|s| s.as_u16()),
                kind: e.kind(),
                route: request.route.clone(),
                request: format!("{} {}", request.method, request.uri),
            }),
        })
    }

    /// Builds the record for a call and emits it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogEncoding`] in strict mode if a body is not JSON;
    /// nothing is emitted in that case.
    pub fn log_attempt(
        &self,
        log_name: &str,
        request: &BuiltRequest,
        response: Option<&RawResponse>,
        error: Option<&Error>,
    ) -> Result<()> {
        let record = self.record(request, response, error)?;
        let level = if error.is_some() {
            Level::WARN
        } else {
            Level::INFO
        };
        self.sink.log(level, log_name, &record);
        Ok(())
    }

    fn decode_body(&self, section: &'static str, body: &[u8]) -> Result<Option<LoggedBody>> {
        if body.is_empty() {
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Ok(Some(LoggedBody::Json(value))),
            Err(e) => match self.decoding {
                BodyDecoding::Lenient => Ok(Some(LoggedBody::Text(
                    String::from_utf8_lossy(body).into_owned(),
                ))),
                BodyDecoding::Strict => Err(Error::LogEncoding {
                    section,
                    serde_error: e.to_string(),
                }),
            },
        }
    }
}

impl std::fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLogger")
            .field("host", &self.host)
            .field("decoding", &self.decoding)
            .finish_non_exhaustive()
    }
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

fn http_version(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_11 {
        "1.1"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RequestBuilder;
    use crate::options::{CallOptions, MultipartPart};
    use crate::route::{RouteDefinition, RouteMethod};
    use http::StatusCode;
    use serde_json::json;

    fn build(call: CallOptions) -> BuiltRequest {
        let route = RouteDefinition::new("users", RouteMethod::Post, "/users");
        RequestBuilder::default().build(&route, &call).unwrap()
    }

    fn logger(sink: &Arc<MemorySink>) -> RequestLogger {
        RequestLogger::new(sink.clone(), "https://api.example.com")
    }

    #[test]
    fn success_logs_request_and_response_at_info() {
        let sink = Arc::new(MemorySink::new());
        let request = build(
            CallOptions::new()
                .with_body(json!({"name": "Alice"}))
                .with_query_param("notify", 1),
        );
        let response = RawResponse::new(StatusCode::OK, r#"{"id": 7}"#);

        logger(&sink)
            .log_attempt("users api", &request, Some(&response), None)
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let captured = &records[0];
        assert_eq!(captured.level, Level::INFO);
        assert_eq!(captured.log_name, "users api");

        let record = &captured.record;
        assert_eq!(record.request.path, "/users");
        assert_eq!(record.request.http_version, "1.1");
        assert_eq!(record.request.host, "https://api.example.com");
        assert_eq!(
            record.request.headers["content-type"],
            vec!["application/json"]
        );
        assert_eq!(
            record.request.body,
            Some(LoggedBody::Json(json!({"name": "Alice"})))
        );

        let response = record.response.as_ref().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, Some(LoggedBody::Json(json!({"id": 7}))));
        assert!(record.error.is_none());
    }

    #[test]
    fn transport_error_logs_error_without_response_at_warn() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new());

        logger(&sink)
            .log_attempt(DEFAULT_LOG_NAME, &request, None, Some(&Error::Timeout))
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::WARN);
        let record = &records[0].record;
        assert!(record.response.is_none());
        let error = record.error.as_ref().unwrap();
        assert_eq!(error.message, "Request timed out");
        assert_eq!(error.kind, "timeout");
        assert_eq!(error.route, "users");
        assert_eq!(error.request, "POST /users");
        assert_eq!(error.code, None);
    }

    #[test]
    fn lenient_mode_captures_non_json_as_text() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new().with_form_param("user", "alice"));
        let response = RawResponse::new(StatusCode::OK, "<html>ok</html>");

        logger(&sink)
            .log_attempt("form", &request, Some(&response), None)
            .unwrap();

        let record = &sink.records()[0].record;
        assert_eq!(
            record.request.body,
            Some(LoggedBody::Text("user=alice".to_string()))
        );
        assert_eq!(
            record.response.as_ref().unwrap().body,
            Some(LoggedBody::Text("<html>ok</html>".to_string()))
        );
    }

    #[test]
    fn strict_mode_rejects_non_json_and_emits_nothing() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new());
        let response = RawResponse::new(StatusCode::OK, "not json");

        let result = logger(&sink)
            .with_body_decoding(BodyDecoding::Strict)
            .log_attempt("strict", &request, Some(&response), None);

        match result {
            Err(Error::LogEncoding { section, .. }) => assert_eq!(section, "response"),
            other => panic!("Expected LogEncoding, got {:?}", other),
        }
        assert!(sink.records().is_empty());
    }

    #[test]
    fn multipart_body_logged_by_part_names() {
        let sink = Arc::new(MemorySink::new());
        let request = build(
            CallOptions::new()
                .with_part(MultipartPart::new("avatar", vec![0u8, 159, 146, 150]))
                .with_part(MultipartPart::new("caption", "hi")),
        );

        logger(&sink)
            .with_body_decoding(BodyDecoding::Strict)
            .log_attempt("upload", &request, None, None)
            .unwrap();

        assert_eq!(
            sink.records()[0].record.request.body,
            Some(LoggedBody::Parts {
                multipart: vec!["avatar".to_string(), "caption".to_string()]
            })
        );
    }

    #[test]
    fn http_error_carries_status_code() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new());
        let response = RawResponse::new(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"down"}"#);
        let error = response.error_for_status().unwrap();

        logger(&sink)
            .log_attempt("down", &request, Some(&response), Some(&error))
            .unwrap();

        let record = &sink.records()[0].record;
        assert_eq!(record.error.as_ref().unwrap().code, Some(503));
        assert_eq!(record.response.as_ref().unwrap().status_code, 503);
    }

    #[test]
    fn error_section_names_the_failed_request() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new().with_query_param("page", 2));
        let response = RawResponse::new(StatusCode::NOT_FOUND, "missing");
        let error = response.error_for_status().unwrap();

        logger(&sink)
            .log_attempt("users api", &request, Some(&response), Some(&error))
            .unwrap();

        let error = sink.records()[0].record.error.clone().unwrap();
        assert_eq!(error.route, "users");
        assert_eq!(error.request, "POST /users?page=2");
        assert_eq!(error.code, Some(404));
    }

    #[test]
    fn record_serializes_with_section_names() {
        let sink = Arc::new(MemorySink::new());
        let request = build(CallOptions::new());
        let record = logger(&sink)
            .record(&request, None, Some(&Error::Timeout))
            .unwrap();

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("Request").is_some());
        assert!(value.get("Response").is_none());
        assert_eq!(value["Errors"]["kind"], "timeout");
        assert_eq!(value["Errors"]["route"], "users");
        assert_eq!(value["Request"]["body"], Value::Null);
    }
}
