//! `aeris` — validate orchestrator configs and dispatch tool batches.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aeris_core::{OrchestratorConfig, ToolRequest};
use aeris_runtime::{
    AdapterRegistry, AirqoBackendFactory, CapabilityRegistry, OpenMeteoBackendFactory,
    SearxBackendFactory, ToolDispatcher, WaqiBackendFactory,
};

#[derive(Parser)]
#[command(name = "aeris", version, about = "Aeris tool orchestration layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an orchestrator configuration file
    Validate {
        /// Path to the YAML configuration
        config: PathBuf,
    },

    /// Dispatch a batch of tool requests against configured backends
    Dispatch {
        /// Path to the YAML configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Path to a JSON file with the request batch
        #[arg(short, long)]
        requests: PathBuf,

        /// Pretty-print the response JSON
        #[arg(long)]
        pretty: bool,

        /// Print budget/circuit health after the batch
        #[arg(long)]
        health: bool,
    },
}

fn builtin_adapters() -> AdapterRegistry {
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(AirqoBackendFactory));
    adapters.register(Arc::new(WaqiBackendFactory));
    adapters.register(Arc::new(OpenMeteoBackendFactory));
    adapters.register(Arc::new(SearxBackendFactory));
    adapters
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Validate { config } => {
            let config = OrchestratorConfig::from_yaml_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            config.validate().context("configuration invalid")?;

            // Materialize the registry so unknown adapter kinds and missing
            // credentials surface now, not at first request.
            let registry = CapabilityRegistry::from_config(&config, &builtin_adapters())
                .context("materializing capability registry")?;

            let mut capabilities = registry.capability_names();
            capabilities.sort_unstable();
            for capability in capabilities {
                for backend in registry.backends(capability).unwrap_or(&[]) {
                    let reachable = backend.adapter.health_check().await;
                    println!(
                        "{capability}: {} (priority {}) {}",
                        backend.name,
                        backend.priority,
                        if reachable { "ok" } else { "unreachable" }
                    );
                }
            }

            let dispatcher = ToolDispatcher::builder()
                .config(config)
                .registry(registry)
                .build()
                .context("building dispatcher")?;
            let health = dispatcher.health();

            println!(
                "ok: {} circuits registered, budget {}/{}",
                health.circuits.len(),
                health.budget.used,
                health.budget.limit
            );
            Ok(())
        }

        Command::Dispatch {
            config,
            requests,
            pretty,
            health,
        } => {
            let config = OrchestratorConfig::from_yaml_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;

            let raw = std::fs::read_to_string(&requests)
                .with_context(|| format!("reading {}", requests.display()))?;
            let batch: Vec<ToolRequest> =
                serde_json::from_str(&raw).context("parsing request batch")?;

            let dispatcher = ToolDispatcher::builder()
                .config(config)
                .adapters(builtin_adapters())
                .build()
                .context("building dispatcher")?;

            let responses = dispatcher.dispatch(&batch).await;

            let rendered = if pretty {
                serde_json::to_string_pretty(&responses)?
            } else {
                serde_json::to_string(&responses)?
            };
            println!("{rendered}");

            if health {
                let snapshot = dispatcher.health();
                eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli).await
}
