//! The default mocked-endpoint implementation: replays recorded
//! interactions, records live traffic when recording is enabled, tracks
//! per-scenario replay counters (spec.md §4.4).
//!
//! Grounded in the teacher's `imposter/core.rs::Imposter`: `AtomicBool` for
//! the recording flag, `parking_lot::RwLock` for the mutable
//! scenario/counter state shared across request-hook invocations.

use super::{ProcessOutcome, Service};
use crate::errors::CoreError;
use crate::http::{Request, Response};
use crate::interaction::Interaction;
use crate::scenario_store::ScenarioStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DEFAULT_SCENARIO: &str = "default";

pub struct MockService {
    name: String,
    hosts: Vec<String>,
    store: Arc<ScenarioStore>,
    active_scenario: RwLock<String>,
    recording: AtomicBool,
    /// scenario -> interaction name -> replay count.
    counters: RwLock<HashMap<String, HashMap<String, u64>>>,
}

impl MockService {
    pub fn new(name: impl Into<String>, hosts: Vec<String>, store: Arc<ScenarioStore>) -> Self {
        Self {
            name: name.into(),
            hosts,
            store,
            active_scenario: RwLock::new(DEFAULT_SCENARIO.to_string()),
            recording: AtomicBool::new(false),
            counters: RwLock::new(HashMap::new()),
        }
    }

    fn replay_count(&self, scenario: &str, interaction_name: &str) -> u64 {
        self.counters
            .read()
            .get(scenario)
            .and_then(|c| c.get(interaction_name))
            .copied()
            .unwrap_or(0)
    }

    fn record_replay(&self, scenario: &str, interaction_name: &str) {
        *self
            .counters
            .write()
            .entry(scenario.to_string())
            .or_default()
            .entry(interaction_name.to_string())
            .or_insert(0) += 1;
    }

    fn find_matching_interaction(
        &self,
        scenario: &str,
        request: &Request,
    ) -> Result<Option<Interaction>, CoreError> {
        let interactions = self.store.load_interactions(scenario, &self.name)?;
        for interaction in interactions {
            if interaction.matches(request) {
                let count = self.replay_count(scenario, &interaction.name);
                if interaction.replay_allowed(count) {
                    return Ok(Some(interaction));
                }
            }
        }
        Ok(None)
    }
}

impl Service for MockService {
    fn kind(&self) -> &'static str {
        "MockService"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }

    fn process_request(&self, request: &Request) -> Result<ProcessOutcome, CoreError> {
        let scenario = self.active_scenario();
        let recording = self.is_recording();

        let found = match self.find_matching_interaction(&scenario, request) {
            Ok(found) => found,
            Err(CoreError::ScenarioNotInService { .. }) if recording => {
                return Ok(ProcessOutcome::DoNotIntercept);
            }
            Err(e) => return Err(e),
        };

        match found {
            Some(interaction) => {
                self.record_replay(&scenario, &interaction.name);
                interaction.execute_callbacks();
                Ok(ProcessOutcome::Respond(interaction.response))
            }
            None if recording => Ok(ProcessOutcome::DoNotIntercept),
            None => Err(CoreError::NoMatchingRecording {
                service: self.name.clone(),
                request: request.url.clone(),
            }),
        }
    }

    fn process_response(&self, request: &Request, response: &Response) {
        if !self.is_recording() {
            return;
        }
        let scenario = self.active_scenario();
        let interaction = Interaction::new_default("", request.clone(), response.clone());
        if let Err(e) = self.store.record_interaction(&scenario, &self.name, &interaction) {
            tracing::error!("failed to record interaction for {}: {e}", self.name);
        }
    }

    fn set_active_scenario(&self, scenario: &str) {
        *self.active_scenario.write() = scenario.to_string();
        self.counters.write().insert(scenario.to_string(), HashMap::new());
    }

    fn active_scenario(&self) -> String {
        self.active_scenario.read().clone()
    }

    fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn replay_counts(&self) -> HashMap<String, u64> {
        let scenario = self.active_scenario();
        self.counters.read().get(&scenario).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;

    fn store_with_interaction(dir: &std::path::Path, scenario: &str, service: &str, max_replays: Option<i64>) {
        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);
        let response = Response::new(200, None, None, Headers::new(), None, None);
        let mut interaction = Interaction::new_default("interaction_0", request, response);
        interaction.max_replays = max_replays;
        interaction
            .save(&dir.join(scenario).join(service))
            .unwrap();
    }

    #[test]
    fn exact_match_respects_replay_quota() {
        let dir = tempfile::tempdir().unwrap();
        store_with_interaction(dir.path(), "default", "Svc", Some(2));
        let store = Arc::new(ScenarioStore::new(dir.path()));
        let service = MockService::new("Svc", vec!["host_a.local".to_string()], store);

        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);

        for _ in 0..2 {
            match service.process_request(&request).unwrap() {
                ProcessOutcome::Respond(response) => assert_eq!(response.status_code, 200),
                ProcessOutcome::DoNotIntercept => panic!("expected a response"),
            }
        }

        let err = service.process_request(&request).unwrap_err();
        assert!(matches!(err, CoreError::NoMatchingRecording { .. }));
    }

    #[test]
    fn missing_scenario_with_recording_signals_do_not_intercept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScenarioStore::new(dir.path()));
        let service = MockService::new("Svc", vec!["host_a.local".to_string()], store);
        service.set_recording(true);

        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);
        match service.process_request(&request).unwrap() {
            ProcessOutcome::DoNotIntercept => {}
            ProcessOutcome::Respond(_) => panic!("expected do-not-intercept"),
        }
    }

    #[test]
    fn missing_scenario_without_recording_propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScenarioStore::new(dir.path()));
        let service = MockService::new("Svc", vec!["host_a.local".to_string()], store);

        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);
        let err = service.process_request(&request).unwrap_err();
        assert!(matches!(err, CoreError::ScenarioNotInService { .. }));
    }

    #[test]
    fn set_active_scenario_resets_only_that_scenarios_counters() {
        let dir = tempfile::tempdir().unwrap();
        store_with_interaction(dir.path(), "default", "Svc", None);
        store_with_interaction(dir.path(), "other", "Svc", None);
        let store = Arc::new(ScenarioStore::new(dir.path()));
        let service = MockService::new("Svc", vec!["host_a.local".to_string()], store);

        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);
        service.process_request(&request).unwrap();
        assert_eq!(service.replay_counts().get("interaction_0"), Some(&1));

        service.set_active_scenario("other");
        assert!(service.replay_counts().is_empty());

        service.set_active_scenario("default");
        assert!(service.replay_counts().is_empty());
    }

    #[test]
    fn recording_persists_live_pair_with_default_match_rules() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ScenarioStore::new(dir.path()));
        let service = MockService::new("Svc", vec!["host_a.local".to_string()], store);
        service.set_recording(true);

        let request = Request::new("https://host_a.local/api", "GET", None, Headers::new(), None, None);
        let response = Response::new(200, None, None, Headers::new(), None, None);
        service.process_response(&request, &response);

        let written = dir.path().join("default").join("Svc").join("interaction_0.yaml");
        assert!(written.exists());
        let loaded = Interaction::load(&written).unwrap();
        assert_eq!(loaded.request, request);
        assert_eq!(loaded.response, response);
        assert_eq!(loaded.match_rules.exact, vec!["url", "method", "body"]);
        assert!(loaded.callbacks.is_empty());
    }
}
