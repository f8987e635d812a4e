//! Case-insensitive, order-preserving multi-map of HTTP headers.
//!
//! Grounded in `examples/original_source/inspire_mitmproxy/http/headers.py`
//! (`MITMHeaders`): names are title-cased on insertion, values are kept in
//! insertion order, and equality is structural over the normalized map.

use std::collections::HashMap;

/// A single logical header with its sequence of values.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// Normalized, case-insensitive HTTP header collection.
///
/// Header names are stored title-cased ("Content-Type", not "content-type"
/// or "CONTENT-TYPE"). Multiple values for the same name are preserved in
/// insertion order. Equality compares the normalized map by content, not by
/// the order header *names* were inserted, so `from_dict(to_dict(h)) == h`
/// holds even though `HashMap` iteration order is not stable.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<Entry>,
}

/// Title-case a header name: each `-`-separated segment gets its first byte
/// upper-cased and the rest lower-cased ("content-type" -> "Content-Type",
/// "HOST" -> "Host").
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>()
                        + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl Headers {
    /// An empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a name -> ordered values dictionary (spec.md §4.1).
    pub fn from_dict(dict: HashMap<String, Vec<String>>) -> Self {
        let mut entries = Vec::with_capacity(dict.len());
        for (name, values) in dict {
            entries.push(Entry {
                name: title_case(&name),
                values,
            });
        }
        Self { entries }
    }

    /// Build from the intercepting runtime's raw byte-pair field list
    /// (mirrors `MITMHeaders.from_mitmproxy`).
    pub fn from_raw_fields(fields: &[(Vec<u8>, Vec<u8>)]) -> Self {
        let mut headers = Self::new();
        for (key, value) in fields {
            let key = String::from_utf8_lossy(key).into_owned();
            let value = String::from_utf8_lossy(value).into_owned();
            headers.append(&key, value);
        }
        headers
    }

    /// Append one value for `name`, creating the entry if needed.
    pub fn append(&mut self, name: &str, value: String) {
        let title = title_case(name);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == title) {
            entry.values.push(value);
        } else {
            self.entries.push(Entry {
                name: title,
                values: vec![value],
            });
        }
    }

    /// Replace all values for `name` with a single value.
    pub fn set(&mut self, name: &str, value: String) {
        let title = title_case(name);
        self.entries.retain(|e| e.name != title);
        self.entries.push(Entry {
            name: title,
            values: vec![value],
        });
    }

    /// All values for a header name, case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        let title = title_case(name);
        self.entries
            .iter()
            .find(|e| e.name == title)
            .map(|e| e.values.as_slice())
    }

    /// The first value for a header name, or `None` if it's missing
    /// (spec.md §4.1: "signals missing-key").
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    /// Iterate over `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    /// Convert to a plain name -> ordered values dictionary.
    pub fn to_dict(&self) -> HashMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.values.clone()))
            .collect()
    }

    /// Convert to the intercepting runtime's raw byte-pair field list.
    pub fn to_raw_fields(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut fields = Vec::new();
        for entry in &self.entries {
            for value in &entry.values {
                fields.push((entry.name.clone().into_bytes(), value.clone().into_bytes()));
            }
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.to_dict() == other.to_dict()
    }
}
impl Eq for Headers {}

impl From<HashMap<String, Vec<String>>> for Headers {
    fn from(dict: HashMap<String, Vec<String>>) -> Self {
        Self::from_dict(dict)
    }
}
