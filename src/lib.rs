//! git-archiver - Periodic Git Repository Mirroring
//!
//! git-archiver keeps a configured list of remote repositories mirrored into
//! local directories. Each repository is cloned the first time it is seen and
//! pulled on its own interval afterwards.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration and validation into [`RepositoryTarget`]s
//! - [`git`]: the [`VcsExecutor`] seam and its git command line implementation
//! - [`sync`]: the clone-or-pull state machine
//! - [`scheduler`]: one periodic task per repository
//! - [`report`]: sinks for sync results
//! - [`health`]: preflight checks for the `doctor` command

pub mod config;
pub mod error;
pub mod git;
pub mod health;
pub mod report;
pub mod scheduler;
pub mod sync;

pub use config::{Config, RepositoryTarget};
pub use error::{ConfigError, VcsError};
pub use git::{GitCli, VcsExecutor};
pub use health::{HealthCheck, HostInfo};
pub use report::{LogReporter, SyncReporter};
pub use scheduler::Scheduler;
pub use sync::{SyncAction, SyncOutcome, SyncResult, SyncSummary, Synchronizer};
