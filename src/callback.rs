//! Deferred outbound HTTP calls attached to an interaction replay (spec.md
//! §4.8).
//!
//! Grounded in the teacher's detached-task pattern for fire-and-forget work
//! (`imposter/manager.rs`'s per-connection accept loop) and its
//! `OnceLock<reqwest::Client>` singleton
//! (`imposter/core.rs::get_http_client`); `$VAR`/`${VAR}` expansion mirrors
//! `os.path.expandvars` as used by
//! `examples/original_source/inspire_mitmproxy/interaction.py`.

use crate::http::Request;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, warn};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .expect("failed to build callback HTTP client")
    })
}

static VAR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn var_pattern() -> &'static Regex {
    VAR_PATTERN.get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static pattern"))
}

/// Expand `$VAR` and `${VAR}` references from the process environment.
/// References to unset variables are left untouched, matching Python's
/// `os.path.expandvars`.
pub fn expand_vars(input: &str) -> String {
    var_pattern()
        .replace_all(input, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => caps.get(0).unwrap().as_str().to_string(),
            }
        })
        .into_owned()
}

/// Schedule a single callback: wait `delay_seconds`, then fire an outbound
/// HTTP request built from `request` (with `$VAR` expansion applied to the
/// URL and each header's first value). Runs detached; failures are logged
/// and never surfaced to the replay path.
pub fn schedule(request: Request, delay_seconds: f64) {
    tokio::spawn(async move {
        if delay_seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay_seconds)).await;
        }
        execute(&request).await;
    });
}

async fn execute(request: &Request) {
    let url = expand_vars(&request.url);
    let method = match reqwest::Method::from_bytes(request.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => {
            error!("callback to {url} has invalid method {}: {e}", request.method);
            return;
        }
    };

    let mut builder = client().request(method, &url).body(request.body_bytes().to_vec());
    for (name, values) in request.headers.iter() {
        if let Some(first) = values.first() {
            builder = builder.header(name, expand_vars(first));
        }
    }

    match builder.send().await {
        Ok(response) if response.status().is_success() || response.status().is_redirection() => {}
        Ok(response) => {
            warn!("callback to {url} returned non-2xx status {}", response.status());
        }
        Err(e) => {
            error!("callback to {url} failed: {e}");
        }
    }
}
