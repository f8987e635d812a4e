//! One persisted request/response pair plus matching rules, callbacks, and
//! replay quota (spec.md §4.2).
//!
//! Grounded in `examples/original_source/inspire_mitmproxy/interaction.py`
//! (`Interaction`), restructured around plain `serde`-derived document types
//! so loading a scenario file only ever builds data, never executes
//! constructors — resolving the open question in spec.md §9 structurally
//! rather than by convention.

use crate::errors::CoreError;
use crate::http::{Request, Response};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_EXACT_MATCH_FIELDS: &[&str] = &["url", "method", "body"];
const DEFAULT_CALLBACK_DELAY: f64 = 0.5;

/// A deferred outbound call attached to an interaction replay.
#[derive(Debug, Clone)]
pub struct CallbackDescriptor {
    pub request: Request,
    pub delay_seconds: f64,
}

/// The `match:` block of an interaction: which fields are compared exactly,
/// which are matched against a compiled regex.
#[derive(Debug, Clone)]
pub struct MatchRules {
    pub exact: Vec<String>,
    pub regex: HashMap<String, Arc<Regex>>,
}

impl MatchRules {
    /// The default rules used when the whole `match:` block is absent
    /// (spec.md §3: "If both sections are absent, the Interaction uses the
    /// default exact fields {url, method, body} and empty regex").
    fn default_when_absent() -> Self {
        Self {
            exact: DEFAULT_EXACT_MATCH_FIELDS.iter().map(|s| s.to_string()).collect(),
            regex: HashMap::new(),
        }
    }
}

impl Default for MatchRules {
    /// Used when `match:` is present but empty (`{}`): both sections are
    /// empty, not defaulted (spec.md §3).
    fn default() -> Self {
        Self {
            exact: Vec::new(),
            regex: HashMap::new(),
        }
    }
}

/// One persisted `(request, response, match rules, callbacks, quota)` tuple.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub name: String,
    pub request: Request,
    pub response: Response,
    pub match_rules: MatchRules,
    pub callbacks: Vec<CallbackDescriptor>,
    /// Negative or absent means unlimited (spec.md §3, §6).
    pub max_replays: Option<i64>,
}

impl Interaction {
    /// Build a freshly recorded interaction from a live request/response
    /// pair: default match rules, no callbacks, unlimited replays (spec.md
    /// §4.4 `process_response`, §6 "Default recorded file").
    pub fn new_default(name: impl Into<String>, request: Request, response: Response) -> Self {
        Self {
            name: name.into(),
            request,
            response,
            match_rules: MatchRules::default(),
            callbacks: Vec::new(),
            max_replays: None,
        }
    }

    /// Parse an interaction file. The name is derived from the file stem.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let contents = std::fs::read_to_string(path)?;
        let doc: InteractionDoc = serde_yaml::from_str(&contents)?;
        Self::from_doc(name, doc)
    }

    fn from_doc(name: String, doc: InteractionDoc) -> Result<Self, CoreError> {
        let request = Request::from_dict(&doc.request.into());
        let response = Response::from_dict(&doc.response.into());

        let match_rules = match doc.r#match {
            // Absent entirely, or present but carrying neither an `exact` nor
            // a `regex` entry: both cases fall back to the default exact
            // fields (spec.md §3; the original keys this off dict truthiness
            // — `self.match = match or {}` / `if not self.match: return
            // DEFAULT_EXACT_MATCH_FIELDS` — which treats `{}` the same as
            // absent). A block that only omits one section keeps the other
            // as given, per spec.md §3's second sentence.
            None => MatchRules::default_when_absent(),
            Some(m) if m.exact.is_empty() && m.regex.is_empty() => {
                MatchRules::default_when_absent()
            }
            Some(m) => {
                let mut regex = HashMap::with_capacity(m.regex.len());
                for (field, pattern) in m.regex {
                    let compiled = Regex::new(&pattern).map_err(|e| {
                        CoreError::InvalidRequest(format!(
                            "invalid regex for field {field:?}: {e}"
                        ))
                    })?;
                    regex.insert(field, Arc::new(compiled));
                }
                MatchRules {
                    exact: m.exact,
                    regex,
                }
            }
        };

        let callbacks = doc
            .callbacks
            .into_iter()
            .map(|c| CallbackDescriptor {
                request: Request::from_dict(&c.request.into()),
                delay_seconds: c.delay.unwrap_or(DEFAULT_CALLBACK_DELAY),
            })
            .collect();

        Ok(Self {
            name,
            request,
            response,
            match_rules,
            callbacks,
            max_replays: doc.max_replays,
        })
    }

    /// Write this interaction as `<directory>/<name>.yaml`. Serialization
    /// always emits `match` and `callbacks`, even when empty (spec.md §4.2).
    pub fn save(&self, directory: &Path) -> Result<(), CoreError> {
        std::fs::create_dir_all(directory)?;
        let doc = self.to_doc();
        let yaml = serde_yaml::to_string(&doc)?;
        std::fs::write(directory.join(format!("{}.yaml", self.name)), yaml)?;
        Ok(())
    }

    fn to_doc(&self) -> InteractionDoc {
        InteractionDoc {
            request: RequestDictDoc::from(self.request.to_dict()),
            response: ResponseDictDoc::from(self.response.to_dict()),
            r#match: Some(MatchDoc {
                exact: self.match_rules.exact.clone(),
                regex: self
                    .match_rules
                    .regex
                    .iter()
                    .map(|(field, re)| (field.clone(), re.as_str().to_string()))
                    .collect(),
            }),
            callbacks: self
                .callbacks
                .iter()
                .map(|c| CallbackDoc {
                    delay: Some(c.delay_seconds),
                    request: RequestDictDoc::from(c.request.to_dict()),
                })
                .collect(),
            max_replays: self.max_replays,
        }
    }

    fn matches_exact_rules(&self, request: &Request) -> bool {
        self.match_rules
            .exact
            .iter()
            .all(|field| self.request.exact_value(field) == request.exact_value(field))
    }

    fn matches_regex_rules(&self, request: &Request) -> bool {
        self.match_rules.regex.iter().all(|(field, pattern)| {
            match request.string_value(field) {
                Some(value) => pattern.find(&value).map(|m| m.start() == 0).unwrap_or(false),
                None => false,
            }
        })
    }

    /// True iff every exact field compares equal and every regex field
    /// matches at the start of the request's stringified field value.
    pub fn matches(&self, request: &Request) -> bool {
        self.matches_exact_rules(request) && self.matches_regex_rules(request)
    }

    /// Whether `max_replays` still permits a replay given `count` prior
    /// replays. Negative or absent is unlimited.
    pub fn replay_allowed(&self, count: u64) -> bool {
        match self.max_replays {
            Some(limit) if limit >= 0 => count < limit as u64,
            _ => true,
        }
    }

    /// Schedule every callback descriptor via the callback executor
    /// (fire-and-forget; spec.md §4.2, §4.8).
    pub fn execute_callbacks(&self) {
        for callback in &self.callbacks {
            crate::callback::schedule(callback.request.clone(), callback.delay_seconds);
        }
    }
}

/// The next `interaction_<N>` sequence number for a directory (spec.md §4.2,
/// §8): regular `.yaml` files whose stem matches `interaction_(\d+)`, next
/// number is `max(found) + 1` or `0` if none.
pub fn next_sequence_number(directory: &Path) -> std::io::Result<u32> {
    if !directory.exists() {
        return Ok(0);
    }

    let mut max_found: Option<u32> = None;
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(digits) = stem.strip_prefix("interaction_") {
            if let Ok(n) = digits.parse::<u32>() {
                max_found = Some(max_found.map_or(n, |m| m.max(n)));
            }
        }
    }

    Ok(max_found.map_or(0, |n| n + 1))
}

/// The filesystem name a newly recorded interaction should take.
pub fn sequence_name(n: u32) -> String {
    format!("interaction_{n}")
}

// --- YAML document shapes -------------------------------------------------
//
// Kept distinct from the runtime `Request`/`Response`/`RequestDict` types so
// the on-disk schema (spec.md §6) is explicit and stable regardless of how
// the in-memory model evolves.

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct InteractionDoc {
    request: RequestDictDoc,
    response: ResponseDictDoc,
    #[serde(rename = "match", default)]
    r#match: Option<MatchDoc>,
    #[serde(default)]
    callbacks: Vec<CallbackDoc>,
    #[serde(default)]
    max_replays: Option<i64>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct MatchDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exact: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    regex: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CallbackDoc {
    #[serde(default)]
    delay: Option<f64>,
    request: RequestDictDoc,
}

/// `body:` as it appears on disk (spec.md §6: `string | bytes | null`). Raw
/// bytes are represented as `{binary: <base64>}` so the untagged variants
/// stay unambiguous against a plain text body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum BodyDoc {
    Text(String),
    Binary { binary: String },
    Null,
}

impl From<Option<crate::http::request::BodyValue>> for BodyDoc {
    fn from(value: Option<crate::http::request::BodyValue>) -> Self {
        use base64::Engine;
        match value {
            Some(crate::http::request::BodyValue::Text(t)) => BodyDoc::Text(t),
            Some(crate::http::request::BodyValue::Bytes(b)) => BodyDoc::Binary {
                binary: base64::engine::general_purpose::STANDARD.encode(b),
            },
            None => BodyDoc::Null,
        }
    }
}

impl From<BodyDoc> for Option<crate::http::request::BodyValue> {
    fn from(doc: BodyDoc) -> Self {
        use base64::Engine;
        match doc {
            BodyDoc::Text(t) => Some(crate::http::request::BodyValue::Text(t)),
            BodyDoc::Binary { binary } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(binary)
                    .unwrap_or_default();
                Some(crate::http::request::BodyValue::Bytes(bytes))
            }
            BodyDoc::Null => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RequestDictDoc {
    url: String,
    method: String,
    #[serde(default)]
    body: BodyDoc,
    #[serde(default)]
    headers: HashMap<String, Vec<String>>,
}

impl Default for BodyDoc {
    fn default() -> Self {
        BodyDoc::Null
    }
}

impl From<crate::http::request::RequestDict> for RequestDictDoc {
    fn from(dict: crate::http::request::RequestDict) -> Self {
        Self {
            url: dict.url,
            method: dict.method,
            body: dict.body.into(),
            headers: dict.headers,
        }
    }
}

impl From<RequestDictDoc> for crate::http::request::RequestDict {
    fn from(doc: RequestDictDoc) -> Self {
        Self {
            url: doc.url,
            method: doc.method,
            body: doc.body.into(),
            headers: doc.headers,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StatusDoc {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ResponseDictDoc {
    status: StatusDoc,
    #[serde(default)]
    body: BodyDoc,
    #[serde(default)]
    headers: HashMap<String, Vec<String>>,
}

impl From<crate::http::response::ResponseDict> for ResponseDictDoc {
    fn from(dict: crate::http::response::ResponseDict) -> Self {
        Self {
            status: StatusDoc {
                code: dict.status_code,
                message: dict.status_message,
            },
            body: dict.body.into(),
            headers: dict.headers,
        }
    }
}

impl From<ResponseDictDoc> for crate::http::response::ResponseDict {
    fn from(doc: ResponseDictDoc) -> Self {
        Self {
            status_code: doc.status.code,
            status_message: doc.status.message,
            body: doc.body.into(),
            headers: doc.headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;

    fn sample_interaction(name: &str) -> Interaction {
        let request = Request::new(
            "https://host_a.local/api",
            "GET",
            None,
            Headers::new(),
            None,
            None,
        );
        let response = Response::new(200, None, None, Headers::new(), None, None);
        Interaction::new_default(name, request, response)
    }

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let interaction = sample_interaction("interaction_0");
        interaction.save(dir.path()).unwrap();

        let yaml = std::fs::read_to_string(dir.path().join("interaction_0.yaml")).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["match"], serde_yaml::Value::Mapping(Default::default()));

        let loaded = Interaction::load(&dir.path().join("interaction_0.yaml")).unwrap();
        assert_eq!(loaded.name, "interaction_0");
        assert_eq!(loaded.request, interaction.request);
        assert_eq!(loaded.response, interaction.response);
        // An empty `match: {}` on disk falls back to the default exact
        // fields on load (spec.md §3), even though the in-memory interaction
        // that was recorded carried no match rules at all.
        assert_eq!(loaded.match_rules.exact, vec!["url", "method", "body"]);
        assert!(loaded.match_rules.regex.is_empty());
        assert!(loaded.callbacks.is_empty());
    }

    #[test]
    fn empty_match_block_falls_back_to_default_exact_fields() {
        let yaml = r#"
request:
  url: https://host.local/x
  method: GET
  body: null
  headers: {}
response:
  status: { code: 200, message: OK }
  body: null
  headers: {}
match: {}
"#;
        let doc: InteractionDoc = serde_yaml::from_str(yaml).unwrap();
        let interaction = Interaction::from_doc("interaction_0".into(), doc).unwrap();
        assert_eq!(interaction.match_rules.exact, vec!["url", "method", "body"]);
        assert!(interaction.match_rules.regex.is_empty());
    }

    #[test]
    fn absent_match_block_uses_default_exact_fields() {
        let yaml = r#"
request:
  url: https://host.local/x
  method: GET
  body: null
  headers: {}
response:
  status: { code: 200, message: OK }
  body: null
  headers: {}
"#;
        let doc: InteractionDoc = serde_yaml::from_str(yaml).unwrap();
        let interaction = Interaction::from_doc("interaction_0".into(), doc).unwrap();
        assert_eq!(interaction.match_rules.exact, vec!["url", "method", "body"]);
        assert!(interaction.match_rules.regex.is_empty());
    }

    #[test]
    fn present_but_partial_match_block_leaves_omitted_section_empty() {
        let yaml = r#"
request:
  url: https://host.local/x
  method: GET
  body: null
  headers: {}
response:
  status: { code: 200, message: OK }
  body: null
  headers: {}
match:
  exact: [method]
"#;
        let doc: InteractionDoc = serde_yaml::from_str(yaml).unwrap();
        let interaction = Interaction::from_doc("interaction_0".into(), doc).unwrap();
        assert_eq!(interaction.match_rules.exact, vec!["method"]);
        assert!(interaction.match_rules.regex.is_empty());
    }

    #[test]
    fn exact_match_requires_all_fields_equal() {
        let interaction = sample_interaction("interaction_0");
        let matching = Request::new(
            "https://host_a.local/api",
            "GET",
            None,
            Headers::new(),
            None,
            None,
        );
        let different_method = Request::new(
            "https://host_a.local/api",
            "POST",
            None,
            Headers::new(),
            None,
            None,
        );
        assert!(interaction.matches(&matching));
        assert!(!interaction.matches(&different_method));
    }

    #[test]
    fn regex_match_is_start_anchored() {
        let mut interaction = sample_interaction("interaction_0");
        interaction.match_rules = MatchRules {
            exact: vec!["method".to_string()],
            regex: HashMap::from([(
                "url".to_string(),
                Arc::new(Regex::new(r"https://test\.local/\d+/details").unwrap()),
            )]),
        };
        interaction.request = Request::new(
            "https://unused.local/",
            "POST",
            None,
            Headers::new(),
            None,
            None,
        );

        let post_matching = Request::new(
            "https://test.local/42/details",
            "POST",
            Some(crate::http::request::Body::Text("very nice body".into())),
            Headers::new(),
            None,
            None,
        );
        let get_not_matching = Request::new(
            "https://test.local/42/details",
            "GET",
            None,
            Headers::new(),
            None,
            None,
        );
        assert!(interaction.matches(&post_matching));
        assert!(!interaction.matches(&get_not_matching));
    }

    #[test]
    fn replay_quota_respects_max_replays() {
        let mut interaction = sample_interaction("interaction_0");
        interaction.max_replays = Some(2);
        assert!(interaction.replay_allowed(0));
        assert!(interaction.replay_allowed(1));
        assert!(!interaction.replay_allowed(2));
    }

    #[test]
    fn negative_or_absent_max_replays_is_unlimited() {
        let mut interaction = sample_interaction("interaction_0");
        interaction.max_replays = Some(-1);
        assert!(interaction.replay_allowed(1_000));
        interaction.max_replays = None;
        assert!(interaction.replay_allowed(1_000));
    }

    #[test]
    fn sequence_numbers_skip_unrelated_files_and_increment() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_sequence_number(dir.path()).unwrap(), 0);

        std::fs::write(dir.path().join("interaction_0.yaml"), "").unwrap();
        std::fs::write(dir.path().join("interaction_3.yaml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(next_sequence_number(dir.path()).unwrap(), 4);
    }

    #[test]
    fn sequence_number_is_zero_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert_eq!(next_sequence_number(&missing).unwrap(), 0);
    }
}
