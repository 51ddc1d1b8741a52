//! Maintenance Task
//!
//! Background task bound to one cache instance. On every tick it sweeps
//! expired entries, syncs the log when the fsync policy asks for it, and
//! takes a snapshot when a directory is configured and the cache has been
//! recovered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::persistent::Shared;

/// Owner's side of a running maintenance task.
pub(crate) struct MaintenanceHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Stops future ticks and waits for the task to exit.
    ///
    /// A cycle already running is allowed to finish.
    pub(crate) async fn shutdown(self) {
        // The task may already be gone; nothing to signal then.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!("Maintenance task ended abnormally: {}", e);
        }
    }
}

/// Spawns the periodic maintenance task.
///
/// The first tick fires one full `period` after spawning. Dropping the
/// returned handle also stops the task at its next wakeup.
pub(crate) fn spawn_maintenance_task(shared: Arc<Shared>, period: Duration) -> MaintenanceHandle {
    let (shutdown, mut stop) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        info!("Starting maintenance task with interval of {:?}", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    if let Err(e) = shared.run_maintenance().await {
                        error!("Maintenance cycle failed: {}", e);
                    }
                }
            }
        }

        debug!("Maintenance task stopped");
    });

    MaintenanceHandle { shutdown, task }
}
