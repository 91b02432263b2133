//! Request construction.
//!
//! [`RequestBuilder`] turns a [`RouteDefinition`] and per-call [`CallOptions`]
//! into a [`BuiltRequest`]. Body encodings are applied in a fixed order and a
//! later encoding replaces an earlier one:
//!
//! 1. `body` as JSON (`application/json`)
//! 2. `form_params` as a URL-encoded form (`application/x-www-form-urlencoded`)
//! 3. `multipart` parts (`multipart/form-data`)
//!
//! Query parameters are independent of the body and always land on the URI.
//! Headers layer as dispatcher defaults, then route headers, then call headers,
//! and the derived `Content-Type` is written last.

use crate::multipart::MultipartForm;
use crate::options::CallOptions;
use crate::route::RouteDefinition;
use crate::{Error, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Version};
use serde_json::{Map, Value};
use url::form_urlencoded;

/// `Content-Type` for JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `Content-Type` for URL-encoded form bodies.
pub const CONTENT_TYPE_FORM_ENCODED: &str = "application/x-www-form-urlencoded";

/// The body of a built request.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body.
    Empty,
    /// A fully serialized body.
    Bytes(Bytes),
    /// A multipart body, written out on send.
    Multipart(MultipartForm),
}

impl Body {
    /// The bytes sent on the wire.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Multipart(form) => form.to_bytes(),
        }
    }

    /// Returns `true` for [`Body::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

/// A fully concrete outbound request.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    /// Name of the route this request was built from.
    pub route: String,
    /// HTTP method.
    pub method: Method,
    /// Path plus encoded query string, relative to the base URL.
    pub uri: String,
    /// Protocol version.
    pub version: Version,
    /// Merged headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Body,
    /// The content type derived from the body encoding, if any.
    pub content_type: Option<HeaderValue>,
}

impl BuiltRequest {
    /// The URI without its query string.
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }

    /// The encoded query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }
}

/// Builds requests from route definitions.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    default_headers: HeaderMap,
}

impl RequestBuilder {
    /// Creates a builder that starts every request from `default_headers`.
    pub fn new(default_headers: HeaderMap) -> Self {
        Self { default_headers }
    }

    /// Builds the request for one call of `route`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if a body value cannot be serialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use routeline::{CallOptions, RequestBuilder, RouteDefinition, RouteMethod};
    ///
    /// let route = RouteDefinition::new("search", RouteMethod::Get, "/search");
    /// let request = RequestBuilder::default()
    ///     .build(&route, &CallOptions::new().with_query_param("q", "rust lang"))
    ///     .unwrap();
    ///
    /// assert_eq!(request.uri, "/search?q=rust+lang");
    /// ```
    pub fn build(&self, route: &RouteDefinition, call: &CallOptions) -> Result<BuiltRequest> {
        let options = route.options.overlay(&call.options);

        let mut headers = self.default_headers.clone();
        overlay_headers(&mut headers, &route.headers);
        overlay_headers(&mut headers, &call.headers);

        let mut body = Body::Empty;
        let mut content_type = None;

        if let Some(value) = options.body.as_ref().filter(|v| !is_empty_value(v)) {
            let json = serde_json::to_vec(value).map_err(|e| Error::Encoding(e.to_string()))?;
            body = Body::Bytes(Bytes::from(json));
            content_type = Some(HeaderValue::from_static(CONTENT_TYPE_JSON));
        }

        if let Some(params) = options.form_params.as_ref().filter(|p| !p.is_empty()) {
            body = Body::Bytes(Bytes::from(encode_params(params)));
            content_type = Some(HeaderValue::from_static(CONTENT_TYPE_FORM_ENCODED));
        }

        if let Some(parts) = options.multipart.as_ref().filter(|p| !p.is_empty()) {
            let form = MultipartForm::new(parts)?;
            let value = HeaderValue::try_from(form.content_type())
                .map_err(|e| Error::Encoding(e.to_string()))?;
            body = Body::Multipart(form);
            content_type = Some(value);
        }

        let mut uri = route.path.clone();
        if let Some(query) = options.query.as_ref().filter(|q| !q.is_empty()) {
            let encoded = encode_params(query);
            if !encoded.is_empty() {
                uri.push(if uri.contains('?') { '&' } else { '?' });
                uri.push_str(&encoded);
            }
        }

        if let Some(value) = &content_type {
            headers.insert(CONTENT_TYPE, value.clone());
        }

        Ok(BuiltRequest {
            route: route.name.clone(),
            method: route.method.as_method(),
            uri,
            version: Version::HTTP_11,
            headers,
            body,
            content_type,
        })
    }
}

/// Replaces every header named in `overrides`, keeping all of its values.
fn overlay_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        base.remove(name);
        for value in overrides.get_all(name) {
            base.append(name.clone(), value.clone());
        }
    }
}

/// Falsy values carry no body: `null`, `false`, zero, `""`, `"0"` and empty
/// arrays or objects.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// URL-encodes parameters the way HTML forms do.
///
/// `null` values are skipped, booleans become `1`/`0`, and nested arrays and
/// objects use bracket keys (`tags[0]=a`, `filter[name]=b`).
pub fn encode_params(params: &Map<String, Value>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        append_param(&mut serializer, key, value);
    }
    serializer.finish()
}

fn append_param(serializer: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            serializer.append_pair(key, if *b { "1" } else { "0" });
        }
        Value::Number(n) => {
            serializer.append_pair(key, &n.to_string());
        }
        Value::String(s) => {
            serializer.append_pair(key, s);
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                append_param(serializer, &format!("{}[{}]", key, index), item);
            }
        }
        Value::Object(map) => {
            for (sub_key, item) in map {
                append_param(serializer, &format!("{}[{}]", key, sub_key), item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{MultipartPart, RequestOptions};
    use crate::route::RouteMethod;
    use serde_json::json;

    fn route() -> RouteDefinition {
        RouteDefinition::new("test", RouteMethod::Post, "/items")
    }

    fn content_type(request: &BuiltRequest) -> &str {
        request.headers[CONTENT_TYPE].to_str().unwrap()
    }

    #[test]
    fn query_is_appended_for_every_body_branch() {
        let bodies = vec![
            CallOptions::new(),
            CallOptions::new().with_body(json!({"x": 1})),
            CallOptions::new().with_form_param("f", "v"),
            CallOptions::new().with_part(MultipartPart::new("p", "v")),
        ];

        for call in bodies {
            let call = call.with_query_param("a", "1").with_query_param("b", "2");
            let request = RequestBuilder::default().build(&route(), &call).unwrap();
            assert!(request.uri.ends_with("?a=1&b=2"), "uri was {}", request.uri);
            assert_eq!(request.path(), "/items");
        }
    }

    #[test]
    fn json_body_sets_json_content_type() {
        let call = CallOptions::new().with_body(json!({"name": "Alice"}));
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert_eq!(content_type(&request), CONTENT_TYPE_JSON);
        assert_eq!(request.body.to_bytes(), Bytes::from_static(br#"{"name":"Alice"}"#));
    }

    #[test]
    fn form_params_replace_json_body() {
        let call = CallOptions::new()
            .with_body(json!({"ignored": true}))
            .with_form_param("user", "alice smith")
            .with_form_param("age", 30);
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert_eq!(content_type(&request), CONTENT_TYPE_FORM_ENCODED);
        assert_eq!(request.body.to_bytes(), Bytes::from_static(b"user=alice+smith&age=30"));
    }

    #[test]
    fn multipart_wins_over_form_params() {
        let call = CallOptions::new()
            .with_form_param("user", "alice")
            .with_part(MultipartPart::new("file", "data"));
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert!(content_type(&request).starts_with("multipart/form-data"));
        assert!(matches!(request.body, Body::Multipart(_)));
        assert_eq!(request.headers.get_all(CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn derived_content_type_overrides_caller() {
        let call = CallOptions::new()
            .with_header("Content-Type", "text/plain")
            .unwrap()
            .with_body(json!([1, 2]));
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert_eq!(request.headers.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(content_type(&request), CONTENT_TYPE_JSON);
    }

    #[test]
    fn caller_content_type_kept_without_body() {
        let call = CallOptions::new()
            .with_header("Content-Type", "text/plain")
            .unwrap();
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert_eq!(content_type(&request), "text/plain");
        assert!(request.content_type.is_none());
        assert!(request.body.is_empty());
    }

    #[test]
    fn headers_layer_defaults_route_then_call() {
        let mut defaults = HeaderMap::new();
        defaults.insert("user-agent", "routeline-test".parse().unwrap());
        defaults.insert("x-tenant", "default".parse().unwrap());

        let route = route()
            .with_header("X-Tenant", "route")
            .unwrap()
            .with_header("Accept", "application/json")
            .unwrap();
        let call = CallOptions::new().with_header("accept", "text/csv").unwrap();

        let request = RequestBuilder::new(defaults).build(&route, &call).unwrap();

        assert_eq!(request.headers["user-agent"], "routeline-test");
        assert_eq!(request.headers["x-tenant"], "route");
        assert_eq!(request.headers["accept"], "text/csv");
    }

    #[test]
    fn call_options_override_route_template() {
        let route = route().with_options(
            RequestOptions::new()
                .with_query_param("page", 1)
                .with_body(json!({"from": "route"})),
        );
        let call = CallOptions::new().with_query_param("page", 5);

        let request = RequestBuilder::default().build(&route, &call).unwrap();

        assert_eq!(request.uri, "/items?page=5");
        assert_eq!(request.body.to_bytes(), Bytes::from_static(br#"{"from":"route"}"#));
    }

    #[test]
    fn route_query_defaults_merge_with_call_query() {
        let route = route().with_options(RequestOptions::new().with_query_param("limit", 50));
        let call = CallOptions::new().with_query_param("page", 2);

        let request = RequestBuilder::default().build(&route, &call).unwrap();

        assert_eq!(request.uri, "/items?limit=50&page=2");
        assert!(request.body.is_empty());
    }

    #[test]
    fn empty_options_produce_no_body() {
        let call = CallOptions::new()
            .with_body(json!({}))
            .with_options(RequestOptions {
                form_params: Some(Map::new()),
                query: Some(Map::new()),
                body: Some(json!({})),
                multipart: Some(Vec::new()),
            });
        let request = RequestBuilder::default().build(&route(), &call).unwrap();

        assert!(request.body.is_empty());
        assert_eq!(request.uri, "/items");
        assert!(request.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn falsy_scalar_bodies_are_not_sent() {
        for value in [json!(0), json!(0.0), json!(false), json!("0"), json!("")] {
            let call = CallOptions::new().with_body(value.clone());
            let request = RequestBuilder::default().build(&route(), &call).unwrap();

            assert!(request.body.is_empty(), "{} was sent", value);
            assert!(request.headers.get(CONTENT_TYPE).is_none());
        }

        for value in [json!(1), json!(true), json!("00"), json!([0])] {
            let call = CallOptions::new().with_body(value.clone());
            let request = RequestBuilder::default().build(&route(), &call).unwrap();

            assert_eq!(request.body.to_bytes(), Bytes::from(value.to_string()));
        }
    }

    #[test]
    fn method_and_path_come_from_route() {
        let route = RouteDefinition::new("del", RouteMethod::Delete, "/items/7");
        let request = RequestBuilder::default()
            .build(&route, &CallOptions::new())
            .unwrap();

        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.uri, "/items/7");
        assert_eq!(request.query(), None);
    }

    #[test]
    fn path_with_existing_query_uses_ampersand() {
        let route = RouteDefinition::new("v", RouteMethod::Get, "/items?version=2");
        let call = CallOptions::new().with_query_param("page", 3);
        let request = RequestBuilder::default().build(&route, &call).unwrap();

        assert_eq!(request.uri, "/items?version=2&page=3");
    }

    #[test]
    fn nested_params_use_bracket_keys() {
        let params = json!({
            "tags": ["a", "b"],
            "filter": {"name": "x"},
            "active": true,
            "deleted": false,
            "missing": null
        });
        let encoded = encode_params(params.as_object().unwrap());

        assert_eq!(
            encoded,
            "tags%5B0%5D=a&tags%5B1%5D=b&filter%5Bname%5D=x&active=1&deleted=0"
        );
    }

    #[test]
    fn invalid_multipart_header_is_encoding_error() {
        let call = CallOptions::new()
            .with_part(MultipartPart::new("file", "x").with_header("X-Bad", "a\r\nb"));
        let result = RequestBuilder::default().build(&route(), &call);

        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
