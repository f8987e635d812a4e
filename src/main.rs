//! CLI entry point: parses arguments, initializes logging, wires the
//! registry/dispatcher/runtime harness together (SPEC_FULL.md §A, §B, §C).
//!
//! Follows the teacher's `main.rs` split between CLI parsing and async
//! bring-up: `clap`-derived `Cli`, a `tracing-subscriber` registry with
//! `EnvFilter`, then handing off to the runtime.

use clap::Parser;
use mockrelay::config::Config;
use mockrelay::dispatcher::Dispatcher;
use mockrelay::management::ManagementService;
use mockrelay::registry::{self, ServiceRegistry};
use mockrelay::runtime::RuntimeHarness;
use mockrelay::scenario_store::ScenarioStore;
use mockrelay::service::Service;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mockrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address the runtime harness binds to for intercepted traffic.
    #[arg(long, default_value = "0.0.0.0:8080", env = "MOCKRELAY_LISTEN")]
    listen: SocketAddr,

    /// Root directory of the scenario store.
    #[arg(long, value_name = "DIR", env = "SCENARIOS_PATH")]
    scenarios_path: Option<PathBuf>,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info", env = "MOCKRELAY_LOGLEVEL")]
    loglevel: String,

    /// JSON or YAML file of initial service descriptions, loaded at startup.
    #[arg(long, value_name = "FILE")]
    services: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.loglevel.clone())))
        .init();

    let mut config = Config::from_env();
    if let Some(scenarios_path) = cli.scenarios_path {
        config.scenarios_path = scenarios_path;
    }

    let store = Arc::new(ScenarioStore::new(config.scenarios_path.clone()));
    let management = Arc::new(ManagementService::new(store.clone()));
    let registry = Arc::new(ServiceRegistry::new(
        vec![management.clone() as Arc<dyn Service>],
        store,
        config,
    ));
    management.attach_registry(registry.clone());

    if let Some(services_path) = cli.services {
        let text = std::fs::read_to_string(&services_path)?;
        let descriptions = registry::parse_service_descriptions(&text)?;
        registry.replace_from_descriptions(1, &descriptions)?;
        info!("loaded {} service(s) from {:?}", descriptions.len(), services_path);
    }

    let dispatcher = Arc::new(Dispatcher::new(registry));
    RuntimeHarness::new(cli.listen, dispatcher).run().await
}
