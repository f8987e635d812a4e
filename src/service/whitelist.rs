//! A service that always signals *do-not-intercept* (spec.md §4.4).
//!
//! Grounded in
//! `examples/original_source/inspire_mitmproxy/services/whitelist_service.py`:
//! `MITM_PROXY_WHITELIST`, if set, overrides any constructor-supplied hosts
//! list.

use super::{ProcessOutcome, Service};
use crate::config::Config;
use crate::errors::CoreError;
use crate::http::{Request, Response};
use std::collections::HashMap;

pub struct WhitelistService {
    name: String,
    hosts: Vec<String>,
}

impl WhitelistService {
    /// `config.whitelist_hosts` (sourced from `MITM_PROXY_WHITELIST`) takes
    /// precedence over `hosts` when present.
    pub fn new(name: impl Into<String>, hosts: Vec<String>, config: &Config) -> Self {
        let hosts = config.whitelist_hosts.clone().unwrap_or(hosts);
        Self {
            name: name.into(),
            hosts,
        }
    }
}

impl Service for WhitelistService {
    fn kind(&self) -> &'static str {
        "WhitelistService"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }

    fn process_request(&self, _request: &Request) -> Result<ProcessOutcome, CoreError> {
        Ok(ProcessOutcome::DoNotIntercept)
    }

    fn process_response(&self, _request: &Request, _response: &Response) {}

    fn set_active_scenario(&self, _scenario: &str) {}

    fn active_scenario(&self) -> String {
        "default".to_string()
    }

    fn set_recording(&self, _recording: bool) {}

    fn is_recording(&self) -> bool {
        false
    }

    fn replay_counts(&self) -> HashMap<String, u64> {
        HashMap::new()
    }
}
