use std::{fmt, sync::Arc, time::Duration};

use peerlink_model::{MergeOutcome, MergeTrigger};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info};

use super::{FederationSnapshotSource, MergeCoordinator};
use crate::error::MergeError;

/// Turns triggers into merge passes on background tasks.
#[derive(Clone)]
pub struct MergeScheduler {
    coordinator: Arc<MergeCoordinator>,
    config: Arc<dyn FederationSnapshotSource>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl fmt::Debug for MergeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeScheduler")
            .field("coordinator", &self.coordinator)
            .field("pending_tasks", &self.tasks.len())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A submitted pass. Dropping the handle leaves the pass running.
#[derive(Debug)]
pub struct MergeHandle {
    trigger: MergeTrigger,
    task: JoinHandle<Result<MergeOutcome, MergeError>>,
}

impl MergeHandle {
    pub fn trigger(&self) -> MergeTrigger {
        self.trigger
    }

    pub async fn outcome(self) -> Result<MergeOutcome, MergeError> {
        self.task
            .await
            .map_err(|err| MergeError::TaskFailed(err.to_string()))?
    }
}

impl MergeScheduler {
    pub fn new(
        coordinator: Arc<MergeCoordinator>,
        config: Arc<dyn FederationSnapshotSource>,
    ) -> Self {
        Self {
            coordinator,
            config,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<MergeCoordinator> {
        &self.coordinator
    }

    /// Starts a pass in the background. It waits its turn at the gate.
    pub fn submit(&self, trigger: MergeTrigger) -> MergeHandle {
        debug!(%trigger, "merge pass requested");
        let coordinator = Arc::clone(&self.coordinator);
        let config = Arc::clone(&self.config);
        let cancel = self.shutdown.child_token();

        let task = self.tasks.spawn(async move {
            coordinator
                .run_from_source(config.as_ref(), trigger, &cancel)
                .await
        });

        MergeHandle { trigger, task }
    }

    /// Submits a [`MergeTrigger::ScheduledTick`] every `interval`.
    ///
    /// The first tick fires one interval from now. A tick that lands while a
    /// pass is running is dropped.
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let scheduler = self.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + interval,
                interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if scheduler.coordinator.is_running() {
                            debug!("skipping scheduled merge; a pass is running");
                            continue;
                        }
                        scheduler.submit(MergeTrigger::ScheduledTick);
                    }
                }
            }
            debug!("periodic merge loop stopped");
        })
    }

    /// Submits a [`MergeTrigger::ConfigChanged`] pass for every change seen on
    /// `changes`. Bursts of changes coalesce into one pass.
    pub fn watch_config_changes<T>(
        &self,
        mut changes: watch::Receiver<T>,
    ) -> JoinHandle<()>
    where
        T: Send + Sync + 'static,
    {
        let scheduler = self.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        scheduler.submit(MergeTrigger::ConfigChanged);
                    }
                }
            }
            debug!("config watch loop stopped");
        })
    }

    /// Cancels running and queued passes, then waits for them to wind down.
    pub async fn shutdown(&self) {
        info!("stopping merge scheduler");
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}
