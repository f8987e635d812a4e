//! Normalized response record (spec.md §4.1).

use super::headers::Headers;
use std::collections::HashMap;

fn decode(bytes: &[u8], encoding_label: &str) -> String {
    let encoding = encoding_rs::Encoding::for_label(encoding_label.as_bytes())
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn encode(text: &str, encoding_label: &str) -> Vec<u8> {
    let encoding = encoding_rs::Encoding::for_label(encoding_label.as_bytes())
        .unwrap_or(encoding_rs::UTF_8);
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Status reason phrases for the codes an interaction is likely to record.
/// Grounded in `examples/original_source/inspire_mitmproxy/http/response.py`,
/// which sources its table from `mitmproxy.net.http.status_codes.RESPONSES`.
fn default_reason(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

use super::request::Body;

/// Normalized HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub status_message: String,
    body: Vec<u8>,
    pub headers: Headers,
    pub original_encoding: String,
    pub http_version: String,
}

impl Response {
    pub fn new(
        status_code: u16,
        status_message: Option<String>,
        body: Option<Body>,
        headers: Headers,
        original_encoding: Option<String>,
        http_version: Option<String>,
    ) -> Self {
        let original_encoding =
            original_encoding.unwrap_or_else(|| super::charset_of(&headers));

        let body_bytes = match body {
            Some(Body::Bytes(bytes)) => bytes,
            Some(Body::Text(text)) => encode(&text, &original_encoding),
            None => Vec::new(),
        };

        Self {
            status_code,
            status_message: status_message
                .unwrap_or_else(|| default_reason(status_code).to_string()),
            body: body_bytes,
            headers,
            original_encoding,
            http_version: http_version.unwrap_or_else(|| "HTTP/1.1".to_string()),
        }
    }

    pub fn from_raw_parts(
        status_code: u16,
        status_message: Option<String>,
        body: Vec<u8>,
        header_fields: &[(Vec<u8>, Vec<u8>)],
        http_version: Option<String>,
    ) -> Self {
        let headers = Headers::from_raw_fields(header_fields);
        Self::new(
            status_code,
            status_message,
            Some(Body::Bytes(body)),
            headers,
            None,
            http_version,
        )
    }

    pub fn from_dict(dict: &ResponseDict) -> Self {
        let headers = Headers::from_dict(dict.headers.clone());
        let body = dict.body.clone().map(|b| match b {
            super::request::BodyValue::Text(t) => Body::Text(t),
            super::request::BodyValue::Bytes(b) => Body::Bytes(b),
        });
        Self::new(
            dict.status_code,
            Some(dict.status_message.clone()),
            body,
            headers,
            None,
            None,
        )
    }

    pub fn to_dict(&self) -> ResponseDict {
        ResponseDict {
            status_code: self.status_code,
            status_message: self.status_message.clone(),
            body: if self.body.is_empty() {
                None
            } else {
                Some(super::request::BodyValue::Text(self.body_as_text()))
            },
            headers: self.headers.to_dict(),
        }
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn body_as_text(&self) -> String {
        decode(&self.body, &self.original_encoding)
    }
}

/// Equality ignores `status_message` and encoding (spec.md §4.1): compares
/// status code, body bytes, headers.
impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.status_code == other.status_code && self.body == other.body && self.headers == other.headers
    }
}
impl Eq for Response {}

/// The persisted dictionary form of a response (`response:` block in
/// scenario YAML).
#[derive(Debug, Clone)]
pub struct ResponseDict {
    pub status_code: u16,
    pub status_message: String,
    pub body: Option<super::request::BodyValue>,
    pub headers: HashMap<String, Vec<String>>,
}
