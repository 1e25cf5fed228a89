//! Bandit server, a multi-armed bandit decision service.
//!
//! Main entry point that wires the model store, the bandit service and the
//! HTTP API together.

use bandit_api::ApiServer;
use bandit_core::config::{AppConfig, StoreBackend};
use bandit_service::{BanditService, RetryPolicy};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Redis,
    Memory,
}

impl From<Backend> for StoreBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Redis => StoreBackend::Redis,
            Backend::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bandit-server")]
#[command(about = "Multi-armed bandit decision service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "BANDIT_SERVER__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "BANDIT_SERVER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Model store backend (overrides config)
    #[arg(long, value_enum)]
    store: Option<Backend>,

    /// Enable the local read-through model cache in front of Redis
    #[arg(long, default_value_t = false)]
    cache: bool,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bandit_server=info,bandit_service=info,bandit_store=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Bandit server starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(backend) = cli.store {
        config.store.backend = backend.into();
    }
    if cli.cache {
        config.store.cache_enabled = true;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        backend = ?config.store.backend,
        cache_enabled = config.store.cache_enabled,
        max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );

    let store = bandit_store::connect(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialise model store");
        e
    })?;

    let service = Arc::new(BanditService::new(
        store,
        RetryPolicy::from_config(&config.retry),
    ));
    let api_server = ApiServer::new(config, service);

    if !cli.no_metrics {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Bandit server is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
