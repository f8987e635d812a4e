//! Filesystem layout for scenarios: loading, enumerating, and appending
//! interactions; sequence-number allocation (spec.md §4.3).
//!
//! Path scheme: `<root>/<scenario>/<service-name>/<interaction-name>.yaml`.
//! Grounded in the teacher's `recording/store.rs` for the shape of a small
//! filesystem-backed store, and in
//! `examples/original_source/inspire_mitmproxy/services/base_service.py`'s
//! `dump_interaction`/directory-resolution logic for the on-disk scheme
//! itself.

use crate::errors::CoreError;
use crate::interaction::{self, Interaction};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Serializes writers to the same `<root>/<scenario>/<service>/` directory so
/// sequence-number allocation (read-then-write) never races (spec.md §5).
pub struct ScenarioStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl ScenarioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn service_dir(&self, scenario: &str, service: &str) -> PathBuf {
        self.root.join(scenario).join(service)
    }

    /// Load every interaction for `(scenario, service)` in lexicographic file
    /// order (spec.md §5, §8). Signals *scenario-not-in-service* if the
    /// directory is absent.
    pub fn load_interactions(
        &self,
        scenario: &str,
        service: &str,
    ) -> Result<Vec<Interaction>, CoreError> {
        let dir = self.service_dir(scenario, service);
        if !dir.is_dir() {
            return Err(CoreError::ScenarioNotInService {
                service: service.to_string(),
                scenario: scenario.to_string(),
            });
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                names.push(path);
            }
        }
        names.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        names.iter().map(|path| Interaction::load(path)).collect()
    }

    /// Persist a freshly recorded interaction into
    /// `<root>/<scenario>/<service>/`, creating the directory if absent and
    /// allocating the next `interaction_<N>` sequence number.
    pub fn record_interaction(
        &self,
        scenario: &str,
        service: &str,
        interaction: &Interaction,
    ) -> Result<Interaction, CoreError> {
        let _guard = self.write_lock.lock();
        let dir = self.service_dir(scenario, service);
        let n = interaction::next_sequence_number(&dir)?;
        let mut recorded = interaction.clone();
        recorded.name = interaction::sequence_name(n);
        recorded.save(&dir)?;
        Ok(recorded)
    }

    /// Enumerate every on-disk scenario as `scenario -> service -> [file,…]`,
    /// backing the `/scenarios` management endpoint (spec.md §4.6).
    pub fn enumerate_scenarios(&self) -> std::io::Result<BTreeMap<String, BTreeMap<String, Vec<String>>>> {
        let mut scenarios = BTreeMap::new();
        if !self.root.is_dir() {
            return Ok(scenarios);
        }

        for scenario_entry in std::fs::read_dir(&self.root)? {
            let scenario_entry = scenario_entry?;
            if !scenario_entry.file_type()?.is_dir() {
                continue;
            }
            let scenario_name = scenario_entry.file_name().to_string_lossy().into_owned();

            let mut services = BTreeMap::new();
            for service_entry in std::fs::read_dir(scenario_entry.path())? {
                let service_entry = service_entry?;
                if !service_entry.file_type()?.is_dir() {
                    continue;
                }
                let service_name = service_entry.file_name().to_string_lossy().into_owned();

                let mut files = Vec::new();
                for file_entry in std::fs::read_dir(service_entry.path())? {
                    let file_entry = file_entry?;
                    if file_entry.file_type()?.is_file() {
                        if let Some(name) = file_entry.file_name().to_str() {
                            if name.ends_with(".yaml") {
                                files.push(name.to_string());
                            }
                        }
                    }
                }
                files.sort();
                services.insert(service_name, files);
            }
            scenarios.insert(scenario_name, services);
        }

        Ok(scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, Request, Response};

    fn sample_interaction() -> Interaction {
        let request = Request::new("https://host.local/x", "GET", None, Headers::new(), None, None);
        let response = Response::new(200, None, None, Headers::new(), None, None);
        Interaction::new_default("interaction_0", request, response)
    }

    #[test]
    fn missing_scenario_directory_signals_scenario_not_in_service() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(dir.path());
        let err = store.load_interactions("default", "Svc").unwrap_err();
        assert!(matches!(err, CoreError::ScenarioNotInService { .. }));
    }

    #[test]
    fn loads_interactions_in_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(dir.path());

        for n in [0, 1, 2] {
            let mut interaction = sample_interaction();
            interaction.name = interaction::sequence_name(n);
            interaction
                .save(&dir.path().join("default").join("Svc"))
                .unwrap();
        }

        let loaded = store.load_interactions("default", "Svc").unwrap();
        let names: Vec<_> = loaded.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["interaction_0", "interaction_1", "interaction_2"]);
    }

    #[test]
    fn records_interaction_allocating_next_sequence_number() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(dir.path());

        let first = store
            .record_interaction("s", "Svc", &sample_interaction())
            .unwrap();
        assert_eq!(first.name, "interaction_0");

        let second = store
            .record_interaction("s", "Svc", &sample_interaction())
            .unwrap();
        assert_eq!(second.name, "interaction_1");
    }

    #[test]
    fn enumerates_scenarios_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(dir.path());
        store.record_interaction("b_scenario", "Svc", &sample_interaction()).unwrap();
        store.record_interaction("a_scenario", "Svc", &sample_interaction()).unwrap();

        let enumerated = store.enumerate_scenarios().unwrap();
        let scenario_names: Vec<_> = enumerated.keys().cloned().collect();
        assert_eq!(scenario_names, vec!["a_scenario", "b_scenario"]);
        assert_eq!(enumerated["a_scenario"]["Svc"], vec!["interaction_0.yaml"]);
    }
}
