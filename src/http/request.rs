//! Normalized request record (spec.md §4.1).

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

/// Either a text or raw byte body, accepted transparently at construction
/// (spec.md §4.1: "accept either text or bytes at construction").
#[derive(Debug, Clone)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

/// Normalized HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: String,
    body: Vec<u8>,
    pub headers: Headers,
    pub original_encoding: String,
    pub http_version: String,
}

impl Request {
    /// Construct a request. `body` may be text or raw bytes; if text, it is
    /// encoded using `original_encoding` (or the charset derived from
    /// `headers` when `original_encoding` is `None`). Absent body is empty
    /// bytes.
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
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
            url: url.into(),
            method: method.into(),
            body: body_bytes,
            headers,
            original_encoding,
            http_version: http_version.unwrap_or_else(|| "HTTP/1.1".to_string()),
        }
    }

    /// Bridge from the intercepting runtime's raw request parts.
    pub fn from_raw_parts(
        url: impl Into<String>,
        method: impl Into<String>,
        body: Vec<u8>,
        header_fields: &[(Vec<u8>, Vec<u8>)],
        http_version: Option<String>,
    ) -> Self {
        let headers = Headers::from_raw_fields(header_fields);
        Self::new(
            url,
            method,
            Some(Body::Bytes(body)),
            headers,
            None,
            http_version,
        )
    }

    /// Build from the persisted dictionary form (`request:` in scenario
    /// YAML), accepting either text or bytes for `body` transparently.
    pub fn from_dict(dict: &RequestDict) -> Self {
        let headers = Headers::from_dict(dict.headers.clone());
        let body = dict.body.clone().map(|b| match b {
            BodyValue::Text(t) => Body::Text(t),
            BodyValue::Bytes(b) => Body::Bytes(b),
        });
        Self::new(dict.url.clone(), dict.method.clone(), body, headers, None, None)
    }

    /// Serialize to the persisted dictionary form, decoding bytes using the
    /// recorded encoding and emitting text when possible.
    pub fn to_dict(&self) -> RequestDict {
        RequestDict {
            url: self.url.clone(),
            method: self.method.clone(),
            body: if self.body.is_empty() {
                None
            } else {
                Some(BodyValue::Text(self.body_as_text()))
            },
            headers: self.headers.to_dict(),
        }
    }

    /// Raw body bytes (encoding-stable: constructing from these bytes and
    /// reading them back is the identity).
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as text using `original_encoding`.
    pub fn body_as_text(&self) -> String {
        decode(&self.body, &self.original_encoding)
    }

    /// Fetch a named field for exact comparison (spec.md §4.2: url, method,
    /// body, headers).
    pub fn exact_value(&self, name: &str) -> ExactFieldValue<'_> {
        match name {
            "url" => ExactFieldValue::Text(self.url.as_str()),
            "method" => ExactFieldValue::Text(self.method.as_str()),
            "body" => ExactFieldValue::Bytes(&self.body),
            "headers" => ExactFieldValue::Headers(&self.headers),
            other => {
                tracing::warn!("unknown exact match field {other:?}, treating as unequal");
                ExactFieldValue::Unknown
            }
        }
    }

    /// Fetch a named field as a string for regex matching (spec.md §4.2:
    /// "the request's stringified field"). Bytes fields are decoded with the
    /// request's declared encoding first. `headers` has no single string
    /// representation and is not regex-matchable.
    pub fn string_value(&self, name: &str) -> Option<String> {
        match name {
            "url" => Some(self.url.clone()),
            "method" => Some(self.method.clone()),
            "body" => Some(self.body_as_text()),
            other => {
                tracing::warn!("unknown or non-stringifiable regex match field {other:?}");
                None
            }
        }
    }
}

/// A field value as returned by [`Request::exact_value`].
pub enum ExactFieldValue<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
    Headers(&'a Headers),
    Unknown,
}

impl<'a> PartialEq for ExactFieldValue<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExactFieldValue::Text(a), ExactFieldValue::Text(b)) => a == b,
            (ExactFieldValue::Bytes(a), ExactFieldValue::Bytes(b)) => a == b,
            (ExactFieldValue::Headers(a), ExactFieldValue::Headers(b)) => a == b,
            _ => false,
        }
    }
}

/// Equality over the canonical request attributes, ignoring `http_version`
/// and `original_encoding` (spec.md §4.1).
impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
            && self.method == other.method
            && self.body == other.body
            && self.headers == other.headers
    }
}
impl Eq for Request {}

/// Body as it appears in parsed/serialized YAML or JSON: either text or raw
/// bytes (spec.md §6: `body: string | bytes | null`). The on-disk encoding of
/// the `Bytes` variant (base64 under a `binary:` key) is handled one layer up
/// in `interaction::BodyDoc`; this type only distinguishes the two shapes.
#[derive(Debug, Clone)]
pub enum BodyValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// The persisted dictionary form of a request (`request:` block in scenario
/// YAML, or the management API's JSON request representation).
#[derive(Debug, Clone)]
pub struct RequestDict {
    pub url: String,
    pub method: String,
    pub body: Option<BodyValue>,
    pub headers: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_round_trips_through_bytes() {
        let request = Request::new(
            "https://host.local/x",
            "POST",
            Some(Body::Bytes(vec![0xff, 0x00, 0x41])),
            Headers::new(),
            None,
            None,
        );
        assert_eq!(request.body_bytes(), &[0xff, 0x00, 0x41]);
    }

    #[test]
    fn text_body_encodes_with_declared_charset() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain; charset=utf-8".to_string());
        let request = Request::new(
            "https://host.local/x",
            "POST",
            Some(Body::Text("hello".to_string())),
            headers,
            None,
            None,
        );
        assert_eq!(request.body_bytes(), b"hello");
        assert_eq!(request.body_as_text(), "hello");
    }

    #[test]
    fn equality_ignores_http_version_and_encoding() {
        let a = Request::new(
            "https://host.local/x",
            "GET",
            None,
            Headers::new(),
            Some("utf-8".to_string()),
            Some("HTTP/1.1".to_string()),
        );
        let b = Request::new(
            "https://host.local/x",
            "GET",
            None,
            Headers::new(),
            Some("iso-8859-1".to_string()),
            Some("HTTP/2".to_string()),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn equality_considers_body_and_headers() {
        let mut headers = Headers::new();
        headers.append("X-Test", "1".to_string());
        let a = Request::new(
            "https://host.local/x",
            "GET",
            Some(Body::Text("a".to_string())),
            headers.clone(),
            None,
            None,
        );
        let b = Request::new(
            "https://host.local/x",
            "GET",
            Some(Body::Text("b".to_string())),
            headers,
            None,
            None,
        );
        assert_ne!(a, b);
    }
}
