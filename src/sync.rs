//! Repository synchronization - decides between clone and pull for a target
//!
//! A target whose local path already holds a git clone is pulled, anything
//! else is cloned. Failures never escape as errors: they are folded into the
//! returned [`SyncResult`] so that one broken repository cannot stop the
//! scheduling of any other.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::RepositoryTarget;
use crate::git::VcsExecutor;

/// What a sync attempt did to the local path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Pulled,
}

/// How a sync attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    /// The attempt failed; carries git's diagnostic text
    Failure(String),
}

/// Result of a single sync attempt
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub target: Arc<RepositoryTarget>,
    pub action: SyncAction,
    pub outcome: SyncOutcome,
    pub duration: Duration,
}

/// Aggregate of one pass over every target
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub pulled: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Cloned => f.write_str("clone"),
            SyncAction::Pulled => f.write_str("pull"),
        }
    }
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Success
    }

    /// Failure reason, if the attempt failed
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            SyncOutcome::Success => None,
            SyncOutcome::Failure(reason) => Some(reason),
        }
    }
}

impl SyncSummary {
    /// Compile a summary from the results of one pass
    pub fn from_results(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut cloned = 0;
        let mut pulled = 0;
        let mut failed = 0;

        for result in &results {
            match (&result.outcome, result.action) {
                (SyncOutcome::Failure(_), _) => failed += 1,
                (SyncOutcome::Success, SyncAction::Cloned) => cloned += 1,
                (SyncOutcome::Success, SyncAction::Pulled) => pulled += 1,
            }
        }

        Self {
            total_repositories: results.len(),
            cloned,
            pulled,
            failed,
            duration,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Whether `path` is a directory with a `.git` directory directly under it.
///
/// Checked fresh on every attempt; a concurrent external change between this
/// check and the following git call is tolerated.
pub async fn is_existing_clone(path: &Path) -> bool {
    is_dir(path).await && is_dir(&path.join(".git")).await
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Runs the clone-or-pull state machine against a [`VcsExecutor`]
#[derive(Clone)]
pub struct Synchronizer {
    executor: Arc<dyn VcsExecutor>,
}

impl Synchronizer {
    pub fn new(executor: Arc<dyn VcsExecutor>) -> Self {
        Self { executor }
    }

    /// Synchronize one target. Never retries and never fails: git errors
    /// become [`SyncOutcome::Failure`].
    pub async fn sync(&self, target: &Arc<RepositoryTarget>) -> SyncResult {
        let started = Instant::now();
        let path = target.local_path.as_path();

        let (action, result) = if is_existing_clone(path).await {
            debug!("Pulling {} in {}", target.url, path.display());
            (SyncAction::Pulled, self.executor.pull(path).await)
        } else {
            debug!("Cloning {} into {}", target.url, path.display());
            (
                SyncAction::Cloned,
                self.executor.clone_repo(&target.url, path).await,
            )
        };

        let outcome = match result {
            Ok(()) => SyncOutcome::Success,
            Err(e) => SyncOutcome::Failure(e.to_string()),
        };

        SyncResult {
            target: Arc::clone(target),
            action,
            outcome,
            duration: started.elapsed(),
        }
    }

    /// Synchronize every target once, concurrently, and summarize.
    pub async fn sync_all(&self, targets: &[Arc<RepositoryTarget>]) -> SyncSummary {
        let start_time = Instant::now();
        info!("Synchronizing {} repositories", targets.len());

        let mut futures: FuturesUnordered<_> =
            targets.iter().map(|target| self.sync(target)).collect();

        let mut results = Vec::with_capacity(targets.len());
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        SyncSummary::from_results(results, start_time.elapsed())
    }
}
