//! Entry point from the intercepting runtime; routes request and response
//! events to the right service (spec.md §4.7).
//!
//! Grounded in the teacher's `admin_api/server.rs`/`imposter/manager.rs`
//! request-handling shape (build a normalized request, hand it to the owning
//! object, convert failures to an HTTP response) and in
//! `examples/original_source/inspire_mitmproxy/dispatcher.py`'s exact
//! request/response hook split.

use crate::errors::CoreError;
use crate::http::{Headers, Request, Response};
use crate::registry::ServiceRegistry;
use crate::service::{ProcessOutcome, Service};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the Dispatcher decided to do with an intercepted request.
pub enum DispatchResult {
    /// Write this response into the flow.
    Respond(Response),
    /// Leave the flow untouched; the runtime must forward it to the real
    /// upstream. Carries the owning service so the response hook can later
    /// call `process_response` on the live reply.
    PassThrough { owner: Arc<dyn Service> },
}

pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Build a normalized request, walk the registry in order, and hand the
    /// first handling service the request (spec.md §4.7).
    pub fn request_hook(&self, request: &Request) -> DispatchResult {
        let owner = self
            .registry
            .snapshot()
            .into_iter()
            .find(|service| service.handles(request));

        let Some(owner) = owner else {
            let error = CoreError::NoServicesForRequest(request.url.clone());
            return DispatchResult::Respond(error_to_response(&error));
        };

        debug!(url = %request.url, method = %request.method, service = owner.name(), "dispatching request");

        match owner.process_request(request) {
            Ok(ProcessOutcome::Respond(response)) => DispatchResult::Respond(response),
            Ok(ProcessOutcome::DoNotIntercept) => {
                warn!(url = %request.url, service = owner.name(), "do-not-intercept: passing through to upstream");
                DispatchResult::PassThrough { owner }
            }
            Err(error) => DispatchResult::Respond(error_to_response(&error)),
        }
    }

    /// Invoked after the runtime has received an upstream reply for a
    /// pass-through flow, so recording-eligible services can persist the
    /// live pair (spec.md §4.7).
    pub fn response_hook(&self, owner: &Arc<dyn Service>, request: &Request, response: &Response) {
        owner.process_response(request, response);
    }
}

/// Convert any non-control-flow error into a plain-text response using the
/// error kind's status and rendered message (spec.md §4.7, §7).
fn error_to_response(error: &CoreError) -> Response {
    let mut headers = Headers::new();
    headers.set("Content-Type", "text/plain; charset=utf-8".to_string());
    Response::new(
        error.status().as_u16(),
        None,
        Some(crate::http::request::Body::Text(error.to_string())),
        headers,
        Some("utf-8".to_string()),
        None,
    )
}
