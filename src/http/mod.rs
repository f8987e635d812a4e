//! Normalized HTTP value model (spec.md §4.1).
//!
//! `Headers`, `Request`, and `Response` are the internal representation used
//! to bridge the intercepting runtime's wire types, the on-disk YAML format,
//! and callback dispatch. Nothing outside this module should need to know
//! about the runtime harness's `hyper` types or the YAML schema directly.

mod headers;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;

/// Parse the `charset` parameter off a `Content-Type` header value, defaulting
/// to `utf-8` when the header is absent or the parameter can't be found.
///
/// Grounded in the original Python `encoding_by_header` helper
/// (`examples/original_source/inspire_mitmproxy/http/utils.py`, referenced
/// from `http/request.py` and `http/response.py`).
pub fn charset_of(headers: &Headers) -> String {
    let Some(content_type) = headers.get_first("Content-Type") else {
        return "utf-8".to_string();
    };

    for part in content_type.split(';').skip(1) {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let value = value.trim_matches('"').trim();
        if !value.is_empty() {
            return value.to_lowercase();
        }
    }

    "utf-8".to_string()
}
