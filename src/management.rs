//! Control-plane service bound to the reserved virtual host
//! `mitm-manager.local` (spec.md §4.6).
//!
//! Grounded in
//! `examples/original_source/inspire_mitmproxy/services/management_service.py`
//! for the endpoint table and config-propagation behavior, and in the
//! teacher's `admin_api/router.rs`/`types.rs` for the small
//! path-plus-method router and JSON envelope idiom.

use crate::errors::CoreError;
use crate::http::{Headers, Request, Response};
use crate::registry::{ServiceDescription, ServiceRegistry};
use crate::scenario_store::ScenarioStore;
use crate::service::{ProcessOutcome, Service, ServiceDescriptor};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

pub const MANAGEMENT_HOST: &str = "mitm-manager.local";

fn server_header_value() -> String {
    format!("inspire-mitmproxy/{}", env!("CARGO_PKG_VERSION"))
}

fn path_of(url: &str) -> String {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    match after_scheme.find('/') {
        Some(idx) => after_scheme[idx..]
            .split(['?', '#'])
            .next()
            .unwrap_or("/")
            .to_string(),
        None => "/".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ReplaceServicesBody {
    services: Vec<ServiceDescription>,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    enable: bool,
}

pub struct ManagementService {
    registry: OnceLock<Arc<ServiceRegistry>>,
    store: Arc<ScenarioStore>,
    config: RwLock<serde_json::Map<String, Value>>,
    recording: AtomicBool,
}

impl ManagementService {
    pub fn new(store: Arc<ScenarioStore>) -> Self {
        let mut config = serde_json::Map::new();
        config.insert("active_scenario".to_string(), json!("default"));
        Self {
            registry: OnceLock::new(),
            store,
            config: RwLock::new(config),
            recording: AtomicBool::new(false),
        }
    }

    /// Wire the registry this service controls. Called once at startup,
    /// after the registry has been constructed with this service prepended
    /// at position 0 (breaks the otherwise-circular construction order).
    pub fn attach_registry(&self, registry: Arc<ServiceRegistry>) {
        let _ = self.registry.set(registry);
    }

    fn registry(&self) -> &Arc<ServiceRegistry> {
        self.registry.get().expect("registry attached before use")
    }

    fn config_active_scenario(&self) -> String {
        self.config
            .read()
            .get("active_scenario")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string()
    }

    fn propagate(&self) {
        let scenario = self.config_active_scenario();
        let recording = self.recording.load(Ordering::SeqCst);
        self.registry().propagate(&scenario, recording);
    }

    fn json_response(&self, status: u16, body: Value) -> Response {
        let body_text = if body.is_null() {
            String::new()
        } else {
            serde_json::to_string_pretty(&body).unwrap_or_default()
        };

        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json; encoding=UTF-8".to_string());
        headers.set("Server", server_header_value());

        Response::new(
            status,
            None,
            Some(crate::http::request::Body::Text(body_text)),
            headers,
            Some("utf-8".to_string()),
            None,
        )
    }

    fn handle_get_services(&self) -> Response {
        let descriptors: Vec<ServiceDescriptor> = self.registry().descriptors();
        self.json_response(200, json!({ "services": descriptors }))
    }

    fn handle_replace_services(&self, request: &Request) -> Result<Response, CoreError> {
        let body: ReplaceServicesBody = serde_json::from_str(&request.body_as_text())
            .map_err(|e| CoreError::InvalidRequest(format!("malformed services body: {e}")))?;

        self.registry().replace_from_descriptions(1, &body.services)?;
        Ok(self.json_response(201, Value::Null))
    }

    fn handle_service_interactions(&self, name: &str) -> Result<Response, CoreError> {
        let service = self
            .registry()
            .find_by_name(name)
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))?;
        let counts = service.replay_counts();
        Ok(self.json_response(200, json!(counts)))
    }

    fn handle_get_scenarios(&self) -> Result<Response, CoreError> {
        let scenarios = self.store.enumerate_scenarios()?;
        let body: serde_json::Map<String, Value> = scenarios
            .into_iter()
            .map(|(scenario, services)| (scenario, json!({ "responses": services })))
            .collect();
        Ok(self.json_response(200, Value::Object(body)))
    }

    fn handle_get_config(&self) -> Response {
        self.json_response(200, Value::Object(self.config.read().clone()))
    }

    fn handle_put_config(&self, request: &Request) -> Result<Response, CoreError> {
        let update: Value = serde_json::from_str(&request.body_as_text())
            .map_err(|e| CoreError::InvalidRequest(format!("malformed config body: {e}")))?;
        let update = update
            .as_object()
            .ok_or_else(|| CoreError::InvalidRequest("config body must be a JSON object".to_string()))?;

        {
            let mut config = self.config.write();
            for (key, value) in update {
                config.insert(key.clone(), value.clone());
            }
        }
        self.propagate();
        Ok(self.json_response(204, Value::Null))
    }

    fn handle_post_config(&self, request: &Request) -> Result<Response, CoreError> {
        let replacement: Value = serde_json::from_str(&request.body_as_text())
            .map_err(|e| CoreError::InvalidRequest(format!("malformed config body: {e}")))?;
        let replacement = replacement
            .as_object()
            .ok_or_else(|| CoreError::InvalidRequest("config body must be a JSON object".to_string()))?
            .clone();

        *self.config.write() = replacement;
        self.propagate();
        Ok(self.json_response(201, Value::Null))
    }

    fn handle_record(&self, request: &Request, created_status: u16) -> Result<Response, CoreError> {
        let body: RecordBody = serde_json::from_str(&request.body_as_text())
            .map_err(|e| CoreError::InvalidRequest(format!("malformed record body: {e}")))?;
        self.recording.store(body.enable, Ordering::SeqCst);
        self.propagate();
        Ok(self.json_response(created_status, Value::Null))
    }
}

impl Service for ManagementService {
    fn kind(&self) -> &'static str {
        "Management"
    }

    fn name(&self) -> &str {
        "Management"
    }

    fn hosts(&self) -> Vec<String> {
        vec![MANAGEMENT_HOST.to_string()]
    }

    fn process_request(&self, request: &Request) -> Result<ProcessOutcome, CoreError> {
        let path = path_of(&request.url);
        let method = request.method.to_uppercase();

        let response = match (path.as_str(), method.as_str()) {
            ("/services", "GET") => self.handle_get_services(),
            ("/services", "POST") | ("/services", "PUT") => self.handle_replace_services(request)?,
            ("/scenarios", "GET") => self.handle_get_scenarios()?,
            ("/config", "GET") => self.handle_get_config(),
            ("/config", "PUT") => self.handle_put_config(request)?,
            ("/config", "POST") => self.handle_post_config(request)?,
            ("/record", "PUT") => self.handle_record(request, 204)?,
            ("/record", "POST") => self.handle_record(request, 201)?,
            (path, "GET") if path.starts_with("/service/") && path.ends_with("/interactions") => {
                let name = &path["/service/".len()..path.len() - "/interactions".len()];
                self.handle_service_interactions(name)?
            }
            _ => {
                return Err(CoreError::RequestNotHandledInService {
                    service: self.name().to_string(),
                    request: request.url.clone(),
                })
            }
        };

        Ok(ProcessOutcome::Respond(response))
    }

    fn process_response(&self, _request: &Request, _response: &Response) {}

    fn set_active_scenario(&self, scenario: &str) {
        self.config
            .write()
            .insert("active_scenario".to_string(), json!(scenario));
    }

    fn active_scenario(&self) -> String {
        self.config_active_scenario()
    }

    fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn replay_counts(&self) -> HashMap<String, u64> {
        HashMap::new()
    }
}
