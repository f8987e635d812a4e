//! A mocked endpoint: owns a name, host list, matching/recording state, and
//! exposes handles/process hooks (spec.md §4.4).

mod mock;
mod whitelist;

pub use mock::MockService;
pub use whitelist::WhitelistService;

use crate::errors::CoreError;
use crate::http::{Request, Response};
use std::collections::HashMap;

/// What a service decided to do with a request.
pub enum ProcessOutcome {
    /// Write this response into the flow.
    Respond(Response),
    /// Control signal: leave the flow untouched so the runtime forwards it
    /// upstream (spec.md §4.4, §7). Never surfaced to the client.
    DoNotIntercept,
}

/// The registry-serializable descriptor of a service (spec.md §4.5):
/// `{type, name, hosts}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub hosts: Vec<String>,
}

/// A mocked endpoint consulted by the Dispatcher (spec.md §4.4).
pub trait Service: Send + Sync {
    /// The closed type tag used for registry reconstruction (spec.md §4.5),
    /// e.g. `"MockService"`, `"WhitelistService"`.
    fn kind(&self) -> &'static str;

    fn name(&self) -> &str;

    fn hosts(&self) -> Vec<String>;

    /// Extract the request's target host: `Host` header first value (port
    /// stripped), falling back to the parsed URL's host. Match against
    /// `hosts()` by exact string equality.
    fn handles(&self, request: &Request) -> bool {
        let host = request_host(request);
        let hosts = self.hosts();
        host.map(|h| hosts.iter().any(|candidate| candidate == &h))
            .unwrap_or(false)
    }

    fn process_request(&self, request: &Request) -> Result<ProcessOutcome, CoreError>;

    fn process_response(&self, request: &Request, response: &Response);

    fn set_active_scenario(&self, scenario: &str);

    fn active_scenario(&self) -> String;

    fn set_recording(&self, recording: bool);

    fn is_recording(&self) -> bool;

    /// Replay counters for the active scenario (backs
    /// `/service/{name}/interactions`).
    fn replay_counts(&self) -> HashMap<String, u64>;

    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            kind: self.kind().to_string(),
            name: self.name().to_string(),
            hosts: self.hosts(),
        }
    }
}

/// Host preference: `Host` header first value (port stripped) before the
/// URL's parsed host; a missing/empty `Host` header falls through to the URL
/// host (spec.md §4.4).
pub fn request_host(request: &Request) -> Option<String> {
    let header_host = request
        .headers
        .get_first("Host")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(strip_port);

    header_host.or_else(|| url_host(&request.url))
}

fn strip_port(host_header: &str) -> String {
    match host_header.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
        _ => host_header.to_string(),
    }
}

fn url_host(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    if authority.is_empty() {
        return None;
    }
    Some(strip_port(authority))
}
