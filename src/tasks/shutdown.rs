//! Process teardown around the admin server.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::CacheRegistry;

/// Awaits `serving`, then stops maintenance and disconnects every engine.
///
/// The teardown runs whether `serving` finished cleanly or failed; its
/// outcome is returned afterwards.
pub async fn serve_then_shut_down<F, E>(
    serving: F,
    registry: Arc<CacheRegistry>,
    shutdown: CancellationToken,
    maintenance: JoinHandle<()>,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let served = serving.await;
    if let Err(e) = &served {
        warn!(error = %e, "Admin server failed, shutting down");
    }

    shutdown.cancel();
    if let Err(e) = maintenance.await {
        warn!(error = %e, "Maintenance task ended abnormally");
    }
    registry.disconnect_all().await;

    info!("Shutdown complete");
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::facades::Category;
    use crate::store::MemoryStore;
    use crate::tasks::spawn_maintenance_task;

    fn registry() -> Arc<CacheRegistry> {
        Arc::new(CacheRegistry::with_connector(
            Config::default(),
            Arc::new(MemoryStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_failed_server_still_tears_down() {
        let registry = registry();
        registry.get_instance(Category::Users).await.unwrap();
        let shutdown = CancellationToken::new();
        let maintenance = spawn_maintenance_task(registry.clone(), 3600, shutdown.clone());

        let result = serve_then_shut_down(
            async { Err::<(), _>(std::io::Error::other("accept failed")) },
            registry.clone(),
            shutdown.clone(),
            maintenance,
        )
        .await;

        assert_eq!(result.unwrap_err().to_string(), "accept failed");
        assert!(shutdown.is_cancelled());
        assert!(registry.instances().await.is_empty());
    }

    #[tokio::test]
    async fn test_clean_exit_tears_down() {
        let registry = registry();
        registry.get_instance(Category::Content).await.unwrap();
        let shutdown = CancellationToken::new();
        let maintenance = spawn_maintenance_task(registry.clone(), 3600, shutdown.clone());

        let result = serve_then_shut_down(
            async { Ok::<(), std::io::Error>(()) },
            registry.clone(),
            shutdown.clone(),
            maintenance,
        )
        .await;

        assert!(result.is_ok());
        assert!(shutdown.is_cancelled());
        assert!(registry.instances().await.is_empty());
    }
}
