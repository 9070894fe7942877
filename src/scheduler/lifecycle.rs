// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Scheduler lifecycle: start, stop, run loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{DrainTrigger, Running, Shared, SyncError, SyncScheduler};

impl SyncScheduler {
    /// Arm the timer and start listening for triggers.
    ///
    /// Drains once immediately if online. Calling `start` on a running
    /// scheduler is a no-op. Must be called from inside a Tokio runtime.
    #[tracing::instrument(skip(self))]
    pub fn start(&self) -> Result<(), SyncError> {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Scheduler already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run(self.shared.clone(), shutdown_rx));

        *running = Some(Running { shutdown, handle });
        info!(
            interval_ms = self.shared.interval.as_millis() as u64,
            batch_size = self.shared.batch_size,
            "Sync scheduler started"
        );
        Ok(())
    }

    /// Stop future drains and wait for the loop to exit.
    ///
    /// An in-flight drain finishes first. Returns the error that ended the
    /// loop, if one did.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SyncError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };

        info!("Stopping sync scheduler...");
        let _ = running.shutdown.send(true);

        let result = match running.handle.await {
            Ok(result) => result,
            Err(e) => Err(SyncError::TaskFailed(e.to_string())),
        };
        match &result {
            Ok(()) => info!("Sync scheduler stopped"),
            Err(e) => warn!(error = %e, "Sync scheduler had already failed"),
        }
        result
    }
}

/// Background loop. Exits on shutdown or on a drain error.
async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncError> {
    let mut network = shared.ctx.network.subscribe();
    let mut network_open = true;
    let mut interval = time::interval_at(Instant::now() + shared.interval, shared.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let online = *network.borrow_and_update();
    shared.ctx.status.set_online(online);
    if online {
        shared.drain(DrainTrigger::Startup).await?;
    } else {
        shared.publish_status();
    }

    loop {
        let trigger = tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            changed = network.changed(), if network_open => {
                if changed.is_err() {
                    // Monitor dropped; keep running on the timer alone
                    debug!("Network monitor closed");
                    network_open = false;
                    continue;
                }
                let online = *network.borrow_and_update();
                shared.ctx.status.set_online(online);
                if !online {
                    info!("Offline, drains paused");
                    shared.publish_status();
                    continue;
                }
                info!("Back online, draining");
                DrainTrigger::Online
            }

            _ = shared.manual.notified() => DrainTrigger::Manual,

            _ = interval.tick() => DrainTrigger::Timer,
        };

        if let Err(e) = shared.drain(trigger).await {
            error!(error = %e, %trigger, "Sync loop stopping on unrecoverable error");
            return Err(e);
        }
    }

    debug!("Sync loop exited");
    Ok(())
}
