//! Tiered Cache admin server
//!
//! Runs the cache registry with its L1 maintenance task and serves the
//! operator API (health, stats, invalidation).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::api::create_router;
use tiered_cache::tasks::serve_then_shut_down;
use tiered_cache::{spawn_maintenance_task, AppState, CacheRegistry, Category, Config};

/// Main entry point for the admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the registry and open every category's engine
/// 4. Start the background L1 maintenance task
/// 5. Serve the admin router until SIGINT/SIGTERM
/// 6. Stop maintenance and disconnect every engine
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tiered Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: redis={}:{}/{}, l1_capacity={}, default_ttl={}s, single_flight={}, port={}",
        config.store.host,
        config.store.port,
        config.store.db,
        config.l1_capacity,
        config.default_ttl,
        config.single_flight,
        config.admin_port
    );

    let registry = Arc::new(CacheRegistry::new(config.clone()));
    for category in Category::ALL {
        registry.get_instance(category).await?;
    }
    info!("Cache instances initialized");

    let shutdown = CancellationToken::new();
    let maintenance = spawn_maintenance_task(
        registry.clone(),
        config.maintenance_interval,
        shutdown.clone(),
    );

    let app = create_router(AppState::new(registry.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));
    let signal = shutdown.clone();
    let serving = async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Admin API listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(signal))
            .await
    };

    serve_then_shut_down(serving, registry, shutdown, maintenance).await?;
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    shutdown.cancel();
}
