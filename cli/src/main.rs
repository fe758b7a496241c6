//! Ticket Simulator
//!
//! Loads ticket configurations from a JSON file and runs the simulation of one
//! of them, printing the pool counters after every change until the lifetime
//! cap is drained or Ctrl+C is pressed.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p ticket-sim -- cli/configurations.json <ticket-id> [vendors] [customers]
//! ```
//!
//! Worker counts default to `TICKET_SIM_VENDORS` / `TICKET_SIM_CUSTOMERS`.
//! Metrics are served on `TICKET_SIM_METRICS_ADDR` (default `0.0.0.0:9090`):
//! <http://localhost:9090/metrics>

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use ticket_sim_core::{ConfigurationId, RunState, StartRequest, TicketConfiguration, WorkerCounts};
use ticket_sim_runtime::metrics::MetricsServer;
use ticket_sim_runtime::{DEFAULT_LOG_FILTER, SimulationController, SimulatorConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: ticket-sim <configurations.json> <ticket-id> [vendors] [customers]";

/// Parsed command line
#[derive(Debug)]
struct Args {
    path: PathBuf,
    id: ConfigurationId,
    workers: WorkerCounts,
}

fn parse_count(arg: Option<String>, default: u32, what: &str) -> anyhow::Result<u32> {
    arg.map_or(Ok(default), |value| {
        value
            .parse()
            .with_context(|| format!("invalid {what} count {value:?}"))
    })
}

fn parse_args(defaults: WorkerCounts) -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let (Some(path), Some(id)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };

    let id: u64 = id
        .parse()
        .with_context(|| format!("invalid ticket id {id:?}"))?;

    Ok(Args {
        path: PathBuf::from(path),
        id: ConfigurationId::new(id),
        workers: WorkerCounts::new(
            parse_count(args.next(), defaults.vendors, "vendor")?,
            parse_count(args.next(), defaults.customers, "customer")?,
        ),
    })
}

fn load_configurations(path: &Path) -> anyhow::Result<Vec<TicketConfiguration>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimulatorConfig::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args(config.default_workers)?;
    let configurations = load_configurations(&args.path)?;
    tracing::info!(
        count = configurations.len(),
        path = %args.path.display(),
        "Configurations loaded"
    );

    let Some(configuration) = configurations.into_iter().find(|c| c.id == args.id) else {
        bail!("no configuration with ticket id {}", args.id);
    };

    let metrics = MetricsServer::new(config.metrics_addr);
    if let Err(e) = metrics.serve() {
        tracing::warn!(addr = %metrics.addr(), error = %e, "Metrics endpoint disabled");
    }

    println!(
        "{} / {}: pool capacity {}, {} tickets, {} vendor(s), {} customer(s)",
        configuration.vendor,
        configuration.title,
        configuration.max_ticket_capacity,
        configuration.total_tickets,
        args.workers.vendors,
        args.workers.customers,
    );

    let controller = SimulationController::new(config);
    let mut run = controller.start(StartRequest::new(configuration, args.workers))?;
    let mut snapshots = run.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let state = loop {
        tokio::select! {
            state = run.wait() => break state,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    // Every worker has exited
                    break run.wait().await;
                }
                let snapshot = *snapshots.borrow_and_update();
                println!(
                    "pool {:>5} | released {:>6} | retrieved {:>6}",
                    snapshot.current, snapshot.released, snapshot.retrieved
                );
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
                println!("Stopping simulation...");
                break controller
                    .stop(run.id())
                    .await
                    .map_or(RunState::Stopped, |status| status.state);
            }
        }
    };

    if state == RunState::Completed {
        println!("All tickets sold out.");
    }

    let status = controller.status(run.id())?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
