//! Ordered, mutable list of services with typed reconstruction from
//! descriptions (spec.md §4.5).
//!
//! Grounded in the teacher's `Arc<Imposter>` behind a lock
//! (`imposter/manager.rs`); here the registry is a `RwLock<Vec<Arc<dyn
//! Service>>>` rather than a map, since ordering — not port-keying — is the
//! structuring principle (spec.md §3, §5). Bulk replacement takes the write
//! lock once so a single dispatch never observes a torn view (spec.md §5).

use crate::config::Config;
use crate::errors::CoreError;
use crate::scenario_store::ScenarioStore;
use crate::service::{MockService, Service, ServiceDescriptor, WhitelistService};
use parking_lot::RwLock;
use std::sync::Arc;

/// The closed, compile-time set of reconstructable service kinds (spec.md
/// §4.5, §9 "closed tagged union"). `Management` is never constructed from a
/// description: it is always prepended and holds position 0.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServiceDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub hosts: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ServiceDescriptionsFile {
    services: Vec<ServiceDescription>,
}

/// Parse an initial-services file (`--services`, SPEC_FULL.md §B): JSON or
/// YAML, `{services: [{type, name, hosts}, …]}`. Tries JSON first, then YAML,
/// since every JSON document is also valid YAML and this keeps error
/// messages meaningful for the common JSON case.
pub fn parse_service_descriptions(text: &str) -> Result<Vec<ServiceDescription>, CoreError> {
    if let Ok(parsed) = serde_json::from_str::<ServiceDescriptionsFile>(text) {
        return Ok(parsed.services);
    }
    let parsed: ServiceDescriptionsFile = serde_yaml::from_str(text)
        .map_err(|e| CoreError::InvalidRequest(format!("malformed services file: {e}")))?;
    Ok(parsed.services)
}

pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn Service>>>,
    store: Arc<ScenarioStore>,
    config: Config,
}

impl ServiceRegistry {
    /// `prefix` is kept at the front of the registry across every
    /// `replace_from_description` call (used to keep Management at position
    /// 0).
    pub fn new(prefix: Vec<Arc<dyn Service>>, store: Arc<ScenarioStore>, config: Config) -> Self {
        Self {
            services: RwLock::new(prefix),
            store,
            config,
        }
    }

    /// Snapshot of the registry in order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Service>> {
        self.services.read().clone()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.read().iter().find(|s| s.name() == name).cloned()
    }

    /// Replace every service after `prefix_len` with services reconstructed
    /// from `descriptions`, preserving the prepended prefix (spec.md §4.5).
    /// Holds the write lock across the whole swap so a concurrent dispatch
    /// never sees a torn view (spec.md §5).
    pub fn replace_from_descriptions(
        &self,
        prefix_len: usize,
        descriptions: &[ServiceDescription],
    ) -> Result<(), CoreError> {
        let mut rebuilt = Vec::with_capacity(descriptions.len());
        for description in descriptions {
            rebuilt.push(self.construct(description)?);
        }

        let mut services = self.services.write();
        services.truncate(prefix_len);
        services.extend(rebuilt);
        Ok(())
    }

    fn construct(&self, description: &ServiceDescription) -> Result<Arc<dyn Service>, CoreError> {
        match description.kind.as_str() {
            "MockService" => Ok(Arc::new(MockService::new(
                description.name.clone(),
                description.hosts.clone(),
                self.store.clone(),
            ))),
            "WhitelistService" => Ok(Arc::new(WhitelistService::new(
                description.name.clone(),
                description.hosts.clone(),
                &self.config,
            ))),
            other => Err(CoreError::InvalidServiceType(other.to_string())),
        }
    }

    /// Registry descriptors in order, for the `/services` management
    /// endpoint.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.services.read().iter().map(|s| s.descriptor()).collect()
    }

    /// Propagate an active-scenario/recording change to every service in the
    /// registry (spec.md §4.6).
    pub fn propagate(&self, active_scenario: &str, recording: bool) {
        for service in self.services.read().iter() {
            service.set_active_scenario(active_scenario);
            service.set_recording(recording);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ProcessOutcome;

    struct StubManagement;
    impl Service for StubManagement {
        fn kind(&self) -> &'static str {
            "Management"
        }
        fn name(&self) -> &str {
            "Management"
        }
        fn hosts(&self) -> Vec<String> {
            vec!["mitm-manager.local".to_string()]
        }
        fn process_request(&self, _r: &crate::http::Request) -> Result<ProcessOutcome, CoreError> {
            unimplemented!()
        }
        fn process_response(&self, _r: &crate::http::Request, _resp: &crate::http::Response) {}
        fn set_active_scenario(&self, _s: &str) {}
        fn active_scenario(&self) -> String {
            "default".to_string()
        }
        fn set_recording(&self, _r: bool) {}
        fn is_recording(&self) -> bool {
            false
        }
        fn replay_counts(&self) -> std::collections::HashMap<String, u64> {
            Default::default()
        }
    }

    fn registry(dir: &std::path::Path) -> ServiceRegistry {
        let store = Arc::new(ScenarioStore::new(dir));
        let management: Arc<dyn Service> = Arc::new(StubManagement);
        ServiceRegistry::new(vec![management], store, Config::default())
    }

    #[test]
    fn replace_preserves_prepended_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        registry
            .replace_from_descriptions(
                1,
                &[ServiceDescription {
                    kind: "MockService".to_string(),
                    name: "Arxiv".to_string(),
                    hosts: vec!["arxiv.org".to_string()],
                }],
            )
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name(), "Management");
        assert_eq!(snapshot[1].name(), "Arxiv");
    }

    #[test]
    fn unknown_service_type_fails_with_invalid_service_type() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let err = registry
            .replace_from_descriptions(
                1,
                &[ServiceDescription {
                    kind: "NopeService".to_string(),
                    name: "X".to_string(),
                    hosts: vec![],
                }],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidServiceType(_)));
    }

    #[test]
    fn second_replace_drops_first_replacements_batch() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        registry
            .replace_from_descriptions(
                1,
                &[ServiceDescription {
                    kind: "MockService".to_string(),
                    name: "Old".to_string(),
                    hosts: vec![],
                }],
            )
            .unwrap();
        registry
            .replace_from_descriptions(
                1,
                &[ServiceDescription {
                    kind: "MockService".to_string(),
                    name: "New".to_string(),
                    hosts: vec![],
                }],
            )
            .unwrap();

        let names: Vec<_> = registry.snapshot().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["Management".to_string(), "New".to_string()]);
    }
}
