//! Request option templates and per-call overrides.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Body-encoding and query options shared by route templates and call-time
/// overrides.
///
/// Every field is optional. Parameter maps (`query`, `form_params`) merge per
/// key with call-time entries winning; `body` and `multipart` are replaced
/// whole when a [`CallOptions`] supplies them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Fields sent as an `application/x-www-form-urlencoded` body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_params: Option<Map<String, Value>>,

    /// Query parameters appended to the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,

    /// A value sent as a JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Parts sent as a `multipart/form-data` body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipart: Option<Vec<MultipartPart>>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds a form field.
    pub fn with_form_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.form_params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `body` and sets it as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the value cannot
    /// be represented as JSON.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> crate::Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| crate::Error::Encoding(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Adds a multipart part.
    pub fn with_part(mut self, part: MultipartPart) -> Self {
        self.multipart.get_or_insert_with(Vec::new).push(part);
        self
    }

    /// Returns these options with `overrides` applied on top.
    ///
    /// Query and form parameters keep this template's keys and take the
    /// override's value for any key both define. The body and multipart parts
    /// are replaced as a whole.
    pub fn overlay(&self, overrides: &RequestOptions) -> RequestOptions {
        RequestOptions {
            form_params: merge_params(self.form_params.as_ref(), overrides.form_params.as_ref()),
            query: merge_params(self.query.as_ref(), overrides.query.as_ref()),
            body: overrides.body.clone().or_else(|| self.body.clone()),
            multipart: overrides
                .multipart
                .clone()
                .or_else(|| self.multipart.clone()),
        }
    }
}

fn merge_params(
    base: Option<&Map<String, Value>>,
    overrides: Option<&Map<String, Value>>,
) -> Option<Map<String, Value>> {
    match (base, overrides) {
        (Some(base), Some(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
            Some(merged)
        }
        (base, overrides) => overrides.or(base).cloned(),
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartPart {
    /// The form field name.
    pub name: String,

    /// The part contents.
    pub contents: Bytes,

    /// File name reported in `Content-Disposition`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Extra headers written for this part.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl MultipartPart {
    /// Creates a part with the given field name and contents.
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            filename: None,
            headers: BTreeMap::new(),
        }
    }

    /// Sets the file name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Adds a part header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-invocation overrides for a route call.
///
/// # Examples
///
/// ```
/// use routeline::CallOptions;
///
/// let options = CallOptions::new()
///     .with_query_param("page", 2)
///     .with_header("X-Trace", "abc")
///     .unwrap()
///     .with_log_name("list users");
///
/// assert_eq!(options.log_name.as_deref(), Some("list users"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides for the route's option template.
    pub options: RequestOptions,

    /// Headers applied on top of the route's headers.
    pub headers: HeaderMap,

    /// Overrides the name the call is logged under.
    pub log_name: Option<String>,
}

impl CallOptions {
    /// Creates empty call options; the route's defaults apply unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the option overrides wholesale.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a header override.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.with_query_param(key, value);
        self
    }

    /// Adds a form field.
    pub fn with_form_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.with_form_param(key, value);
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.options = self.options.with_body(body);
        self
    }

    /// Serializes `body` and sets it as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the value cannot
    /// be represented as JSON.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> crate::Result<Self> {
        self.options = self.options.with_json(body)?;
        Ok(self)
    }

    /// Adds a multipart part.
    pub fn with_part(mut self, part: MultipartPart) -> Self {
        self.options = self.options.with_part(part);
        self
    }

    /// Sets the log name for this call.
    pub fn with_log_name(mut self, log_name: impl Into<String>) -> Self {
        self.log_name = Some(log_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn overlay_merges_params_and_keeps_unset_fields() {
        let route = RequestOptions::new()
            .with_query_param("page", 1)
            .with_query_param("sort", "name")
            .with_body(json!({"name": "default"}));
        let call = RequestOptions::new()
            .with_query_param("limit", 10)
            .with_query_param("page", 3);

        let merged = route.overlay(&call);

        let query = merged.query.unwrap();
        let keys: Vec<_> = query.keys().cloned().collect();
        assert_eq!(keys, vec!["page", "sort", "limit"]);
        assert_eq!(query["page"], json!(3));
        assert_eq!(query["limit"], json!(10));
        assert_eq!(merged.body, Some(json!({"name": "default"})));
        assert!(merged.form_params.is_none());
    }

    #[test]
    fn overlay_replaces_body_and_parts_whole() {
        let route = RequestOptions::new()
            .with_form_param("a", 1)
            .with_body(json!({"from": "route", "keep": true}))
            .with_part(MultipartPart::new("route", "r"));
        let call = RequestOptions::new()
            .with_form_param("b", 2)
            .with_body(json!({"from": "call"}))
            .with_part(MultipartPart::new("call", "c"));

        let merged = route.overlay(&call);

        assert_eq!(merged.body, Some(json!({"from": "call"})));
        let parts = merged.multipart.unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "call");
        let form = merged.form_params.unwrap();
        assert_eq!(form["a"], json!(1));
        assert_eq!(form["b"], json!(2));
    }

    #[test]
    fn with_json_rejects_non_string_map_keys() {
        let mut body = HashMap::new();
        body.insert((1, 2), "tuple key");

        let err = RequestOptions::new().with_json(&body).unwrap_err();
        assert!(matches!(err, crate::Error::Encoding(_)));
    }

    #[test]
    fn invalid_header_is_a_configuration_error() {
        let err = CallOptions::new().with_header("bad header", "x").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigurationError(_)));
    }

    #[test]
    fn options_deserialize_from_route_format() {
        let options: RequestOptions = serde_json::from_value(json!({
            "query": {"b": "2", "a": "1"},
            "multipart": [{"name": "file", "contents": "hello", "filename": "a.txt"}]
        }))
        .unwrap();

        let keys: Vec<_> = options.query.as_ref().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        let parts = options.multipart.unwrap();
        assert_eq!(parts[0].contents, Bytes::from_static(b"hello"));
        assert_eq!(parts[0].filename.as_deref(), Some("a.txt"));
    }
}
