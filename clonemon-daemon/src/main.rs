use anyhow::Context;
use clap::Parser;
use clonemon_core::observability::health::{SUBSYSTEM_HISTORY, SUBSYSTEM_SAMPLER};
use clonemon_core::{
    init_observability, shutdown_observability, Config, HealthChecker, HistoryStore,
    MemoryHistoryStore, Monitor, Sampler, SamplerConfig, SamplingScheduler, SqliteCounterSource,
    SqliteHistoryStore, StateManager,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod shutdown;

use shutdown::{shutdown_signal, ShutdownManager};

/// Clone-detector monitor daemon.
#[derive(Parser, Debug)]
#[command(name = "clonemond", version, about)]
struct Args {
    /// Config file (defaults to <config dir>/config.json)
    #[arg(long, env = "CLONEMON_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address, e.g. 0.0.0.0:5000
    #[arg(long)]
    listen: Option<String>,

    /// Seconds between scheduled samples
    #[arg(long)]
    interval: Option<u64>,

    /// Per-query timeout in seconds
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Pipeline database to sample
    #[arg(long)]
    source_db: Option<String>,

    /// Where snapshots are persisted
    #[arg(long)]
    history_db: Option<String>,

    /// Keep history in memory only; it is lost on restart
    #[arg(long)]
    memory_history: bool,

    /// Prometheus exporter port, 0 disables it
    #[arg(long)]
    metrics_port: Option<u16>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        }
        .with_env_overrides();

        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(interval) = self.interval {
            config.sample_interval_secs = interval;
        }
        if let Some(timeout) = self.query_timeout {
            config.query_timeout_secs = timeout;
        }
        if let Some(path) = &self.source_db {
            config.source_db_path = path.clone();
        }
        if let Some(path) = &self.history_db {
            config.history_db_path = path.clone();
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    // Initialize observability FIRST
    init_observability(&config.log_level, config.metrics_port)
        .map_err(|e| anyhow::anyhow!("Failed to initialize observability: {}", e))?;

    info!(
        interval_secs = config.sample_interval_secs,
        query_timeout_secs = config.query_timeout_secs,
        "clonemond starting"
    );

    let health_checker = HealthChecker::new();
    health_checker.register_subsystem(SUBSYSTEM_SAMPLER).await;
    health_checker.register_subsystem(SUBSYSTEM_HISTORY).await;

    let (history, state): (Arc<dyn HistoryStore>, Option<Arc<StateManager>>) =
        if args.memory_history {
            warn!("History is kept in memory and will not survive a restart");
            (Arc::new(MemoryHistoryStore::new()), None)
        } else {
            info!("Initializing history store at {}", config.history_db_path);
            let state = Arc::new(
                StateManager::new(&config.history_db_path)
                    .await
                    .context("Failed to initialize history store")?,
            );
            (Arc::new(SqliteHistoryStore::new(state.clone())), Some(state))
        };

    // Lazy pool: the daemon comes up even while the pipeline database is missing
    info!("Sampling pipeline database at {}", config.source_db_path);
    let source = SqliteCounterSource::open(&config.source_db_path, config.query_timeout());
    let sampler = Sampler::new(Arc::new(source), SamplerConfig::from(&config));
    let monitor = Arc::new(Monitor::new(sampler, history).with_health(health_checker.clone()));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let scheduler = SamplingScheduler::new(monitor.clone(), config.sample_interval()).start();
    info!("clonemond ready");

    let mut signal = shutdown_signal();
    let app_state = api::AppState { monitor, health: health_checker };
    let served = api::serve(listener, app_state, async move {
        let _ = signal.recv().await;
    })
    .await;

    ShutdownManager::new(scheduler, state).shutdown().await;

    info!("clonemond shutting down");
    shutdown_observability();
    served.context("HTTP server failed")
}
