//! Gamepool Service - account pool over TCP and HTTP
//!
//! This is the main entry point for the gamepool service.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamepool_service::{
    create_router, tcp, AppState, Dispatcher, PoolService, ServiceConfig, WorkerPool,
};
use gamepool_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gamepool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting gamepool service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        tcp_addr = %config.tcp_addr,
        http_addr = %config.http_addr,
        database_configured = %config.database_url.is_some(),
        workers = config.worker_count,
        insert_count = config.cache.insert_count,
        query_count = config.cache.query_count,
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;
    let service = Arc::new(PoolService::new(store, config.cache.clone()));
    let pool = Arc::new(WorkerPool::start(
        Arc::new(Dispatcher::new(Arc::clone(&service))),
        config.worker_count,
        config.worker_queue_size,
    ));

    let shutdown = CancellationToken::new();
    let flush_task = service.spawn_flush_task(shutdown.clone());

    let tcp_listener = tokio::net::TcpListener::bind(&config.tcp_addr).await?;
    let tcp_task = tokio::spawn(tcp::serve(
        tcp_listener,
        Arc::clone(&pool),
        config.max_frame_bytes,
        shutdown.clone(),
    ));

    let app = create_router(AppState::new(Arc::clone(&service), config.clone()));
    tracing::info!(http_addr = %config.http_addr, "Starting HTTP server");
    let http_listener = tokio::net::TcpListener::bind(&config.http_addr).await?;

    let signal_token = shutdown.clone();
    axum::serve(http_listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await?;

    // HTTP is down; make sure everything else sees the shutdown too.
    shutdown.cancel();
    tcp_task.await??;
    pool.stop().await;
    flush_task.await?;
    service.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        tracing::info!("Connecting to PostgreSQL");
        let store = gamepool_store::PgStore::connect(url, config.db_max_connections).await?;
        store.migrate().await?;
        return Ok(Arc::new(store));
    }

    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled");
    }
    tracing::warn!("Using the in-memory store; data is lost on exit");
    Ok(Arc::new(MemoryStore::new()))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
