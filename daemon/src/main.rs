//! Ballot daemon — entry point for running the vote coordinator.

mod logging;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ballot_coordinator::{
    run_clock_sync, run_health_checks, Coordinator, CoordinatorConfig, EventFeed, EventSink,
    Roster, TracingSink,
};
use ballot_replication::spawn_replica_set;
use ballot_rpc::{AppState, RpcServer};
use clap::Parser;

use crate::logging::LogFormat;
use crate::shutdown::ShutdownController;

#[derive(Parser)]
#[command(name = "ballot-daemon", about = "Distributed vote coordination daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port for the HTTP surface.
    #[arg(long, env = "BALLOT_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Maximum number of concurrently processed votes.
    #[arg(long, env = "BALLOT_MAX_CONCURRENT_VOTES")]
    max_concurrent_votes: Option<usize>,

    /// Number of replica nodes to run.
    #[arg(long, env = "BALLOT_REPLICA_COUNT")]
    replica_count: Option<usize>,

    /// TOML file with the voter roster and candidate list.
    /// The built-in demo roster is used when absent.
    #[arg(long, env = "BALLOT_ROSTER")]
    roster: Option<PathBuf>,

    /// Clock synchronization period in milliseconds.
    #[arg(long, env = "BALLOT_SYNC_INTERVAL_MS")]
    sync_interval_ms: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BALLOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "BALLOT_LOG_FORMAT")]
    log_format: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<CoordinatorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_str().context("config path is not valid UTF-8")?;
            CoordinatorConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {path}"))?
        }
        None => CoordinatorConfig::default(),
    };

    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    if let Some(max) = cli.max_concurrent_votes {
        config.max_concurrent_votes = max;
    }
    if let Some(count) = cli.replica_count {
        config.replica_count = count;
    }
    if let Some(interval) = cli.sync_interval_ms {
        config.sync_interval_ms = interval;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(roster) = &cli.roster {
        config.roster_file = Some(roster.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_logging(LogFormat::parse(&config.log_format), &config.log_level);

    let roster = match &config.roster_file {
        Some(path) => {
            let path = path.to_str().context("roster path is not valid UTF-8")?;
            Roster::from_toml_file(path).with_context(|| format!("loading roster from {path}"))?
        }
        None => Roster::demo(),
    };
    tracing::info!(
        voters = roster.voters.len(),
        candidates = roster.candidates.len(),
        replicas = config.replica_count,
        rpc_port = config.rpc_port,
        "starting ballot daemon"
    );

    let manager = spawn_replica_set(
        config.replica_count,
        config.replica_call_timeout(),
        config.quorum_policy(),
    );
    let feed = Arc::new(EventFeed::new(config.event_feed_capacity));
    let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(TracingSink), Box::new(Arc::clone(&feed))];
    let coordinator = Arc::new(Coordinator::new(&config, roster, manager, sinks)?);

    let sync_task = tokio::spawn(run_clock_sync(
        Arc::clone(&coordinator),
        config.sync_interval(),
    ));
    let health_task = tokio::spawn(run_health_checks(
        Arc::clone(&coordinator),
        config.health_check_interval(),
    ));

    let shutdown = ShutdownController::new();
    let server_shutdown = shutdown.signal();
    let state = AppState {
        coordinator: Arc::clone(&coordinator),
        feed,
    };
    let server = RpcServer::new(config.rpc_port);
    let server_task = tokio::spawn(async move { server.start(state, server_shutdown.triggered()).await });

    shutdown.wait_for_signal().await;

    sync_task.abort();
    health_task.abort();
    server_task.await.context("rpc server task panicked")??;
    tracing::info!("ballot daemon stopped");
    Ok(())
}
