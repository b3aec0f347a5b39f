//! Sinks for sync results

use tracing::{info, warn};

use crate::sync::{SyncAction, SyncOutcome, SyncResult, SyncSummary};

/// Receives the result of every sync attempt.
///
/// Called from the scheduler task that owns the target, so implementations
/// must be cheap and must not block.
pub trait SyncReporter: Send + Sync {
    fn report(&self, result: &SyncResult);
}

impl<F> SyncReporter for F
where
    F: Fn(&SyncResult) + Send + Sync,
{
    fn report(&self, result: &SyncResult) {
        self(result)
    }
}

/// Reports results through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl SyncReporter for LogReporter {
    fn report(&self, result: &SyncResult) {
        let target = &result.target;
        match &result.outcome {
            SyncOutcome::Success => {
                let verb = match result.action {
                    SyncAction::Cloned => "Cloned",
                    SyncAction::Pulled => "Pulled",
                };
                info!(
                    "{} {} at {} in {:.2}s",
                    verb,
                    target.url,
                    target.local_path.display(),
                    result.duration.as_secs_f64()
                );
            }
            SyncOutcome::Failure(reason) => {
                warn!(
                    "Failed to {} {} at {}: {}",
                    result.action,
                    target.url,
                    target.local_path.display(),
                    reason
                );
            }
        }
    }
}

/// Log a one-pass summary
pub fn log_summary(summary: &SyncSummary) {
    info!(
        "Sync completed in {:.2}s: {} repos, {} cloned, {} pulled, {} failed",
        summary.duration.as_secs_f64(),
        summary.total_repositories,
        summary.cloned,
        summary.pulled,
        summary.failed
    );
}
