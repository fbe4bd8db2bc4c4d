//! pantry-catalog - grocery/recipe catalog service
//!
//! Serves the catalog HTTP API and runs the background enrichment worker that
//! fills items with nutrition data from the external provider.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pantry_catalog::budget::{BudgetLedger, RedisBudgetLedger};
use pantry_catalog::config::{provider_settings, resolve_api_key, tick_lease_ttl, worker_settings};
use pantry_catalog::lease::{RedisTickLease, TickLease};
use pantry_catalog::queue::{EnrichmentQueue, RedisEnrichmentQueue};
use pantry_catalog::services::{EnrichmentWorker, RecipeIngestor, SpoonacularClient, SqliteCatalog};
use pantry_catalog::AppState;
use pantry_common::config::{load_toml_config, resolve_config_path};

const LEASE_KEY_SUFFIX: &str = ":tick_lease";

/// Command-line arguments for pantry-catalog
#[derive(Parser, Debug)]
#[command(name = "pantry-catalog")]
#[command(about = "Grocery/recipe catalog service with nutrition enrichment")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "PANTRY_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides config)
    #[arg(short, long, env = "PANTRY_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_toml_config(&config_path)?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pantry-catalog v{}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());
    info!("Database: {}", config.database_path.display());

    let db = pantry_common::db::init_database(&config.database_path).await?;

    let redis = redis::Client::open(config.redis_url.as_str())
        .context("Invalid Redis URL")?
        .get_connection_manager()
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection established");

    let enrichment = &config.enrichment;
    let queue: Arc<dyn EnrichmentQueue> = Arc::new(RedisEnrichmentQueue::new(
        redis.clone(),
        enrichment.queue_key.clone(),
        enrichment.priority_multiplier,
    ));
    let budget: Arc<dyn BudgetLedger> = Arc::new(RedisBudgetLedger::new(
        redis.clone(),
        enrichment.budget_key.clone(),
        enrichment.daily_allowance,
        Duration::from_secs(enrichment.budget_window_secs),
    ));

    let api_key = resolve_api_key(&config)?;
    let provider = Arc::new(SpoonacularClient::new(provider_settings(&config, api_key))?);

    let settings = worker_settings(&config);
    let mut worker = EnrichmentWorker::new(
        queue.clone(),
        budget.clone(),
        provider.clone(),
        Arc::new(SqliteCatalog::new(db.clone())),
        settings.clone(),
    );
    if enrichment.coordinate_instances {
        let ttl = tick_lease_ttl(&config);
        let lease: Arc<dyn TickLease> = Arc::new(RedisTickLease::new(
            redis.clone(),
            format!("{}{}", enrichment.queue_key, LEASE_KEY_SUFFIX),
            ttl,
        ));
        worker = worker.with_lease(lease);
        info!(ttl_secs = ttl.as_secs(), "Tick lease enabled for multi-instance coordination");
    }

    let cancel = CancellationToken::new();
    let worker_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    let ingestor = Arc::new(
        RecipeIngestor::new(db.clone(), provider, queue.clone())
            .with_result_count(config.ingestion.result_count),
    );
    let app = pantry_catalog::build_router(AppState::new(db, queue, budget, ingestor));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("HTTP server stopped, waiting for enrichment worker");
    cancel.cancel();
    worker_handle.await.context("Enrichment worker panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
