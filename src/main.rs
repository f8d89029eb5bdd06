// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use order_engine::{
    api::{ApiServer, AppState},
    config::{self, Config, QueueBackend, StoreBackend},
    dex::{get_all_sources, get_settlement},
    orders::{InMemoryOrderStore, OrderService, OrderStore, PostgresOrderStore},
    queue::{JobQueue, MemoryJobQueue, OrderProcessor, RedisJobQueue, WorkerPool},
    routing::DexRouter,
    utils::setup_logging,
    websocket::StatusChannelRegistry,
};
use std::sync::Arc;

/// Market order execution engine: HTTP intake, DEX routing, live status over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "order-engine", version, about, long_about = None)]
struct Cli {
    /// HTTP port (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Order store backend: memory | postgres (overrides ORDER_STORE)
    #[arg(long)]
    store: Option<StoreBackend>,

    /// Job queue backend: memory | redis (overrides JOB_QUEUE)
    #[arg(long)]
    queue: Option<QueueBackend>,

    /// Orders processed concurrently (overrides WORKER_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(store) = self.store {
            config.order_store = store;
        }
        if let Some(queue) = self.queue {
            config.job_queue = queue;
        }
        if let Some(concurrency) = self.concurrency {
            config.worker_concurrency = concurrency;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

async fn build_store(app_config: &Config) -> Result<Arc<dyn OrderStore>> {
    match app_config.order_store {
        StoreBackend::Memory => {
            info!("Using in-memory order store");
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
        StoreBackend::Postgres => {
            let max_connections = (app_config.worker_concurrency as u32).max(5);
            let store = PostgresOrderStore::connect(&app_config.database_url, max_connections)
                .await
                .context("connecting to PostgreSQL")?;
            store.ensure_schema().await.context("creating orders table")?;
            Ok(Arc::new(store))
        }
    }
}

async fn build_queue(app_config: &Config) -> Result<Arc<dyn JobQueue>> {
    match app_config.job_queue {
        QueueBackend::Memory => {
            info!("Using in-memory job queue");
            Ok(Arc::new(MemoryJobQueue::new()))
        }
        QueueBackend::Redis => {
            let queue = RedisJobQueue::new(&app_config.redis_url, &app_config.queue_name)
                .await
                .context("connecting to Redis")?;
            queue.requeue_stalled().await.context("requeueing stalled jobs")?;
            Ok(Arc::new(queue))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = config::load_config_with(|c| cli.apply(c))?;

    setup_logging(&app_config.log_level).context("initializing logging")?;
    info!("🚀 Order execution engine starting");
    app_config.log_settings();

    let store = build_store(&app_config).await?;
    let queue = build_queue(&app_config).await?;
    let registry = Arc::new(StatusChannelRegistry::new());

    let router = Arc::new(
        DexRouter::new(get_all_sources(&app_config), get_settlement(&app_config))
            .with_timeouts(app_config.quote_timeout(), app_config.settlement_timeout()),
    );
    let processor = Arc::new(OrderProcessor::new(store.clone(), router, registry.clone()));
    let pool = WorkerPool::spawn(
        queue.clone(),
        processor,
        app_config.worker_concurrency,
        app_config.retry_policy(),
    );

    let service = OrderService::new(store, queue);
    let server = ApiServer::new(app_config.http_port, AppState::new(service, registry));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = server.start(shutdown).await {
        error!("HTTP server error: {}", e);
    }

    pool.shutdown().await;
    info!("Order execution engine stopped");
    Ok(())
}
