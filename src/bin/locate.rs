//! locate - resolve service locations from the command line
//!
//! # Usage
//!
//! ```bash
//! # Round-robin over a static list
//! locate static "10.0.0.1:9000;10.0.0.2" --default-port 9000 -n 4
//!
//! # One HTTP lookup per resolution
//! locate http https://discovery.internal/servers
//!
//! # Dynamic locator against a seeded in-memory ensemble
//! locate simulate --config cluster.toml --path /billing/api -n 3
//!
//! # Watch the locator's lifecycle
//! RUST_LOG=locator_dynamic=debug locate simulate --config cluster.toml
//! ```
//!
//! # Simulation file
//!
//! ```toml
//! bootstrap = "zk1:2181"
//! service = "/billing/api"
//!
//! [locator]
//! path = "/services"
//! strict = false
//!
//! [[nodes]]
//! path = "/services/billing/api/n1"
//! data = '{"address": "10.0.0.1", "port": 8080}'
//! ```
//!
//! Node paths are absolute in the ensemble, so they include the locator's
//! root path. The service path is relative to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use locator_core::{Locator, StaticLocator, StaticLocatorParameters};
use locator_coord::MemoryEnsemble;
use locator_dynamic::{DynamicLocator, DynamicLocatorConfig, LocatorEvent};
use locator_http::HttpLocator;

/// Resolve service locations with a static, HTTP or dynamic locator
#[derive(Parser, Debug)]
#[command(name = "locate", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Round-robin over a semicolon-delimited host list
    Static {
        /// Entries as host[:port];host[:port]...
        resource: String,

        /// Port for entries that do not carry one
        #[arg(long)]
        default_port: Option<u16>,

        /// Number of locations to resolve
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Resolve through one HTTP GET per location
    Http {
        /// Discovery URL answering {"servers": [...]}
        url: String,

        /// Number of locations to resolve
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Run the dynamic locator against a seeded in-memory ensemble
    Simulate {
        /// Simulation file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Service path to resolve, overriding `service` in the file
        #[arg(long)]
        path: Option<String>,

        /// Number of locations to resolve
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

// ============================================================================
// Simulation File
// ============================================================================

#[derive(Debug, Deserialize)]
struct SimulationFile {
    /// Resource handed to the static bootstrap locator.
    bootstrap: String,

    /// Default service path.
    service: Option<String>,

    locator: DynamicLocatorConfig,

    #[serde(default)]
    nodes: Vec<SimulatedNode>,
}

#[derive(Debug, Deserialize)]
struct SimulatedNode {
    path: String,
    #[serde(default)]
    data: String,
}

impl SimulationFile {
    fn parse(raw: &str) -> Result<Self> {
        let file: Self = toml::from_str(raw).context("Failed to parse simulation file")?;
        file.locator
            .validate()
            .context("Invalid [locator] table")?;
        Ok(file)
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw)
    }

    fn seed(&self, ensemble: &MemoryEnsemble) -> Result<()> {
        for node in &self.nodes {
            ensemble
                .put(&node.path, node.data.as_bytes().to_vec())
                .with_context(|| format!("Failed to seed node {}", node.path))?;
        }
        debug!(nodes = self.nodes.len(), "Seeded in-memory ensemble");
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Resolves `count` locations, printing one per line.
async fn resolve_many(locator: &dyn Locator, count: usize) -> Result<Vec<String>> {
    let mut resolved = Vec::with_capacity(count);
    for _ in 0..count {
        let location = locator
            .locate()
            .await
            .context("Failed to resolve a location")?;
        println!("{location}");
        resolved.push(location.to_string());
    }
    Ok(resolved)
}

async fn simulate(config: &Path, path: Option<String>, count: usize) -> Result<Vec<String>> {
    let file = SimulationFile::load(config)?;
    let service = path
        .or_else(|| file.service.clone())
        .context("No service path given (use --path or set `service` in the file)")?;

    let ensemble = MemoryEnsemble::new();
    file.seed(&ensemble)?;

    let bootstrap = StaticLocator::new(file.bootstrap.as_str()).context("Invalid bootstrap")?;
    let locator = DynamicLocator::new(
        file.locator.clone(),
        Arc::new(bootstrap),
        Arc::new(ensemble.connector()),
    )
    .context("Failed to start dynamic locator")?;

    let mut events = locator.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                LocatorEvent::FailedToGetChildren { .. }
                | LocatorEvent::FailedToGetChildInfo { .. }
                | LocatorEvent::BootstrapError { .. } => {
                    warn!(event = event.kind().as_str(), path = event.path(), "Locator event")
                }
                _ => info!(event = event.kind().as_str(), path = event.path(), "Locator event"),
            }
        }
    });

    let pool = locator.for_path(&service)?;
    let resolved = resolve_many(&pool, count).await;

    if let Some(status) = pool.status().await {
        info!(
            path = %status.path,
            size = status.size(),
            generation = status.generation,
            last_updated = ?status.last_updated,
            "Pool status"
        );
    }

    locator.shutdown().await;
    drop(locator);
    event_log.abort();
    resolved
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Static {
            resource,
            default_port,
            count,
        } => {
            let locator = StaticLocator::new(StaticLocatorParameters {
                resource,
                default_port,
            })
            .context("Invalid resource")?;
            resolve_many(&locator, count).await?;
        }
        Command::Http { url, count } => {
            let locator = HttpLocator::new(url).context("Invalid URL")?;
            resolve_many(&locator, count).await?;
        }
        Command::Simulate {
            config,
            path,
            count,
        } => {
            simulate(&config, path, count).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("locate=info".parse()?)
                .add_directive("locator_dynamic=info".parse()?),
        )
        .init();

    tokio::select! {
        result = run(args.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    }
}
