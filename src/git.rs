use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::error::VcsError;

/// Operations the sync state machine needs from a version control tool.
///
/// Every call spawns a subprocess and suspends the calling task until it
/// exits; other tasks keep running on the runtime meanwhile.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsExecutor: Send + Sync {
    /// Verify the tool can be invoked. Returns its version string.
    async fn check_available(&self) -> Result<String, VcsError>;

    /// Clone `url` into `local_path`, creating parent directories first.
    async fn clone_repo(&self, url: &str, local_path: &Path) -> Result<(), VcsError>;

    /// Fetch and merge all remote updates into the clone at `local_path`.
    async fn pull(&self, local_path: &Path) -> Result<(), VcsError>;
}

/// [`VcsExecutor`] backed by the git command line tool
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    /// Create a client invoking the given git program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        // A shutdown that drops an in-flight sync must not leave git running
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        operation: &'static str,
        cmd: &mut AsyncCommand,
    ) -> Result<Output, VcsError> {
        let output = cmd
            .output()
            .await
            .map_err(|source| VcsError::Spawn { operation, source })?;

        if !output.status.success() {
            return Err(VcsError::command_failed(
                operation,
                output.status.code(),
                &output.stderr,
            ));
        }

        Ok(output)
    }
}

#[async_trait]
impl VcsExecutor for GitCli {
    async fn check_available(&self) -> Result<String, VcsError> {
        let output = self
            .run("--version", self.command().arg("--version"))
            .await
            .map_err(|e| VcsError::unavailable(e.to_string()))?;

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("{} is installed", version);
        Ok(version)
    }

    async fn clone_repo(&self, url: &str, local_path: &Path) -> Result<(), VcsError> {
        // Ensure parent directory exists
        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| VcsError::CreateParent {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        debug!("Running git clone {} {}", url, local_path.display());
        self.run("clone", self.command().arg("clone").arg(url).arg(local_path))
            .await?;
        Ok(())
    }

    async fn pull(&self, local_path: &Path) -> Result<(), VcsError> {
        debug!("Running git pull --all in {}", local_path.display());
        self.run(
            "pull",
            self.command().arg("-C").arg(local_path).args(["pull", "--all"]),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_available() {
        // Git should be installed in dev environment
        let version = GitCli::default()
            .check_available()
            .await
            .expect("git should be available");
        assert!(version.starts_with("git version"));
    }

    #[tokio::test]
    async fn test_check_available_missing_program() {
        let git = GitCli::new("git-archiver-definitely-not-installed");
        assert_matches!(git.check_available().await, Err(VcsError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_check_available_failing_program() {
        // `false` exists but exits non-zero
        let git = GitCli::new("false");
        assert_matches!(git.check_available().await, Err(VcsError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_clone_bad_url_reports_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("nested").join("dir").join("repo");

        let err = GitCli::default()
            .clone_repo("/nonexistent/source/repo.git", &target)
            .await
            .expect_err("clone of a missing source must fail");

        assert_matches!(
            err,
            VcsError::CommandFailed { operation: "clone", ref stderr, .. } if !stderr.is_empty()
        );
        // Parent directories are created even when the clone itself fails
        assert!(temp_dir.path().join("nested").join("dir").is_dir());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_pull_outside_repository_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = GitCli::default()
            .pull(temp_dir.path())
            .await
            .expect_err("pull outside a repository must fail");
        assert_matches!(err, VcsError::CommandFailed { operation: "pull", .. });
    }

    #[tokio::test]
    async fn test_spawn_failure_on_clone() {
        let temp_dir = TempDir::new().unwrap();
        let git = GitCli::new("git-archiver-definitely-not-installed");
        let err = git
            .clone_repo("https://example.com/repo.git", &temp_dir.path().join("repo"))
            .await
            .unwrap_err();
        assert_matches!(err, VcsError::Spawn { operation: "clone", .. });
    }
}
