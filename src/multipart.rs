//! `multipart/form-data` encoding (RFC 7578).

use crate::options::MultipartPart;
use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderName, HeaderValue};
use rand::Rng;
use std::borrow::Cow;

/// A validated multipart body, ready to be written out.
///
/// The boundary is chosen once at construction so every attempt of a retried
/// request sends identical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<EncodedPart>,
}

#[derive(Debug, Clone, PartialEq)]
struct EncodedPart {
    name: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    contents: Bytes,
}

impl MultipartForm {
    /// Validates the parts and picks a random boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if a part header name or value is invalid.
    pub fn new(parts: &[MultipartPart]) -> Result<Self> {
        Self::with_boundary(parts, generate_boundary())
    }

    pub(crate) fn with_boundary(parts: &[MultipartPart], boundary: String) -> Result<Self> {
        let parts = parts.iter().map(encode_part).collect::<Result<Vec<_>>>()?;
        Ok(Self { boundary, parts })
    }

    /// The boundary separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Field names in body order.
    pub fn part_names(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.name.clone()).collect()
    }

    /// Writes the body.
    pub fn to_bytes(&self) -> Bytes {
        let mut output = BytesMut::new();

        for part in &self.parts {
            output.put_slice(b"--");
            output.put_slice(self.boundary.as_bytes());
            output.put_slice(b"\r\n");

            for (name, value) in &part.headers {
                output.put_slice(canonical_name(name).as_bytes());
                output.put_slice(b": ");
                output.put_slice(value.as_bytes());
                output.put_slice(b"\r\n");
            }
            output.put_slice(b"\r\n");

            output.put_slice(&part.contents);
            output.put_slice(b"\r\n");
        }

        output.put_slice(b"--");
        output.put_slice(self.boundary.as_bytes());
        output.put_slice(b"--\r\n");

        output.freeze()
    }
}

fn encode_part(part: &MultipartPart) -> Result<EncodedPart> {
    let mut headers = Vec::with_capacity(part.headers.len() + 2);
    for (name, value) in &part.headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| Error::Encoding(format!("Invalid multipart header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| Error::Encoding(format!("Invalid multipart header value: {}", e)))?;
        headers.push((name, value));
    }

    if !headers
        .iter()
        .any(|(name, _)| *name == http::header::CONTENT_DISPOSITION)
    {
        let mut disposition = format!("form-data; name=\"{}\"", escape_quotes(&part.name));
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", escape_quotes(filename)));
        }
        let value = HeaderValue::try_from(disposition)
            .map_err(|e| Error::Encoding(format!("Invalid multipart part name: {}", e)))?;
        headers.insert(0, (http::header::CONTENT_DISPOSITION, value));
    }

    if let Some(filename) = &part.filename {
        let has_type = headers
            .iter()
            .any(|(name, _)| *name == http::header::CONTENT_TYPE);
        if !has_type {
            if let Some(mime) = mime_guess::from_path(filename).first() {
                let value = HeaderValue::try_from(mime.essence_str())
                    .map_err(|e| Error::Encoding(format!("Invalid part content type: {}", e)))?;
                headers.push((http::header::CONTENT_TYPE, value));
            }
        }
    }

    if !headers
        .iter()
        .any(|(name, _)| *name == http::header::CONTENT_LENGTH)
    {
        headers.push((
            http::header::CONTENT_LENGTH,
            HeaderValue::from(part.contents.len()),
        ));
    }

    Ok(EncodedPart {
        name: part.name.clone(),
        headers,
        contents: part.contents.clone(),
    })
}

/// `content-disposition` -> `Content-Disposition`.
fn canonical_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

fn generate_boundary() -> String {
    let value: u128 = rand::thread_rng().gen();
    format!("routeline-{:032x}", value)
}
