//! Process-wide configuration, read once at startup and passed through
//! construction (see the Design Notes in spec.md §9 on global process state).

use std::env;
use std::path::PathBuf;

const DEFAULT_SCENARIOS_PATH: &str = "./scenarios/";

/// Typed configuration object threaded through registry and service
/// construction. Reading env once here (rather than scattering `env::var`
/// calls through the dispatch path) lets a test harness substitute a
/// `Config` without touching real process environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the scenario store.
    pub scenarios_path: PathBuf,
    /// Whitespace-separated hostnames for the whitelist service, from
    /// `MITM_PROXY_WHITELIST`. `None` means the environment variable was
    /// unset and the service's constructor-supplied host list applies.
    pub whitelist_hosts: Option<Vec<String>>,
}

impl Config {
    /// Build configuration from process environment.
    pub fn from_env() -> Self {
        let scenarios_path = env::var("SCENARIOS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCENARIOS_PATH));

        let whitelist_hosts = env::var("MITM_PROXY_WHITELIST").ok().map(|raw| {
            raw.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Self {
            scenarios_path,
            whitelist_hosts,
        }
    }

    /// Build configuration explicitly, bypassing the environment (for tests).
    pub fn new(scenarios_path: impl Into<PathBuf>, whitelist_hosts: Option<Vec<String>>) -> Self {
        Self {
            scenarios_path: scenarios_path.into(),
            whitelist_hosts,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenarios_path: PathBuf::from(DEFAULT_SCENARIOS_PATH),
            whitelist_hosts: None,
        }
    }
}
