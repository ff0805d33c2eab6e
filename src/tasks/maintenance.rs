//! L1 Maintenance Task
//!
//! Background task that periodically drops stale L1 shadows in every engine
//! the registry has created, and logs each engine's stats.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::CacheRegistry;

/// Spawns the maintenance loop.
///
/// The task sleeps `interval_secs` between passes and exits as soon as
/// `shutdown` is cancelled, so shutdown does not have to abort it.
///
/// # Example
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let handle = spawn_maintenance_task(registry.clone(), 30, shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// handle.await?;
/// ```
pub fn spawn_maintenance_task(
    registry: Arc<CacheRegistry>,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting L1 maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("L1 maintenance task stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            run_pass(&registry).await;
        }
    })
}

/// One maintenance pass over every engine. Returns the number of L1 entries
/// purged.
pub async fn run_pass(registry: &CacheRegistry) -> usize {
    let mut purged = 0;
    for (name, engine) in registry.instances().await {
        let removed = engine.purge_expired();
        purged += removed;

        let stats = engine.stats();
        if removed > 0 {
            info!(
                instance = %name,
                removed,
                l1_size = stats.l1_size,
                "L1 maintenance: purged expired entries"
            );
        }
        debug!(
            instance = %name,
            l1_size = stats.l1_size,
            hit_rate = stats.hit_rate(),
            l2_errors = stats.l2_errors,
            "Cache stats"
        );
    }
    purged
}
