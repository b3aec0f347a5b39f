//! Scheduler - one independent periodic sync task per repository
//!
//! Every target gets its own tokio task. The task syncs once right away,
//! then arms a repeating timer with the target's interval and syncs on every
//! tick. Tasks share nothing mutable, so a slow, failing or hung repository
//! only ever delays itself.
//!
//! There is no timeout around git: a hung subprocess stalls its own target
//! until the process is interrupted.

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{RepositoryTarget, MAX_INTERVAL};
use crate::report::SyncReporter;
use crate::sync::Synchronizer;

/// Drives periodic synchronization of a set of targets
#[derive(Clone)]
pub struct Scheduler {
    synchronizer: Synchronizer,
    reporter: Arc<dyn SyncReporter>,
}

impl Scheduler {
    pub fn new(synchronizer: Synchronizer, reporter: Arc<dyn SyncReporter>) -> Self {
        Self {
            synchronizer,
            reporter,
        }
    }

    /// Spawn one task per target onto `tasks`.
    pub fn spawn_all(
        &self,
        targets: Vec<RepositoryTarget>,
        cancel: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        for target in targets {
            let target = Arc::new(target);
            let synchronizer = self.synchronizer.clone();
            let reporter = Arc::clone(&self.reporter);
            let cancel = cancel.child_token();

            tasks.spawn(run_target(synchronizer, reporter, target, cancel));
        }
    }

    /// Run every target until `cancel` fires.
    ///
    /// Only returns once all target tasks have stopped. A task that panics
    /// is logged and the remaining targets keep running.
    pub async fn run(&self, targets: Vec<RepositoryTarget>, cancel: CancellationToken) {
        info!("Scheduling {} repositories", targets.len());

        let mut tasks = JoinSet::new();
        self.spawn_all(targets, &cancel, &mut tasks);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("Repository task panicked: {}", e);
                }
            }
        }

        info!("Scheduler stopped");
    }
}

/// Life of a single target: initial sync, then one sync per tick.
async fn run_target(
    synchronizer: Synchronizer,
    reporter: Arc<dyn SyncReporter>,
    target: Arc<RepositoryTarget>,
    cancel: CancellationToken,
) {
    debug!(
        "Starting task for {} every {:?}",
        target.url, target.interval
    );

    // Initial sync completes before the timer exists
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = synchronizer.sync(&target) => reporter.report(&result),
    }

    let period = target.interval.min(MAX_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    // A sync longer than the interval drops the missed ticks instead of
    // firing them back to back
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = synchronizer.sync(&target) => reporter.report(&result),
        }
    }

    debug!("Task for {} cancelled", target.url);
}
