//! System health checks for git-archiver
//!
//! Preflight checks run by `git-archiver doctor` to verify the host can
//! mirror the configured repositories, plus a summary of the host itself.

use std::path::{Path, PathBuf};

use crate::config::{Config, RepositoryTarget};
use crate::git::VcsExecutor;
use crate::sync::is_existing_clone;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Configuration validity
    pub config: CheckResult,
    /// Local state of every configured target path
    pub targets: Vec<CheckResult>,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    #[cfg(test)]
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

/// Static facts about the host, printed alongside the checks
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub os: &'static str,
    pub family: &'static str,
    pub architecture: &'static str,
    pub available_parallelism: Option<usize>,
    pub working_dir: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub home_dir: Option<PathBuf>,
    pub version: &'static str,
}

impl HostInfo {
    pub fn gather() -> Self {
        Self {
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            architecture: std::env::consts::ARCH,
            available_parallelism: std::thread::available_parallelism()
                .ok()
                .map(|n| n.get()),
            working_dir: std::env::current_dir().ok(),
            temp_dir: std::env::temp_dir(),
            home_dir: dirs::home_dir(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Label/value pairs for display
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        vec![
            ("Operating System", format!("{} ({})", self.os, self.family)),
            ("Architecture", self.architecture.to_string()),
            (
                "Available Parallelism",
                self.available_parallelism
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            ("Working Directory", show(&self.working_dir)),
            ("Temp Directory", self.temp_dir.display().to_string()),
            ("Home Directory", show(&self.home_dir)),
            ("git-archiver", self.version.to_string()),
        ]
    }
}

impl HealthCheck {
    /// Run all health checks against the configuration at `config_path`
    pub async fn run(executor: &dyn VcsExecutor, config_path: &Path) -> Self {
        let git = Self::check_git(executor).await;

        let (config, targets) = match Config::load(config_path) {
            Err(e) => (
                CheckResult::error_with_details(
                    "Configuration could not be loaded",
                    format!("{:#}", e),
                ),
                Vec::new(),
            ),
            Ok(config) => match config.targets() {
                Err(e) => (
                    CheckResult::error_with_details("Configuration is invalid", e.to_string()),
                    Vec::new(),
                ),
                Ok(targets) => {
                    let mut checks = Vec::with_capacity(targets.len());
                    for target in &targets {
                        checks.push(Self::check_target(target).await);
                    }
                    (
                        CheckResult::ok_with_details(
                            "Configuration is valid",
                            format!(
                                "{} repositories in {}",
                                targets.len(),
                                config_path.display()
                            ),
                        ),
                        checks,
                    )
                }
            },
        };

        Self {
            git,
            config,
            targets,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.config.passed && self.targets.iter().all(|t| t.passed)
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, check)| check)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, check)| check)
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    async fn check_git(executor: &dyn VcsExecutor) -> CheckResult {
        match executor.check_available().await {
            Ok(version) => CheckResult::ok_with_details("Git installed", version),
            Err(e) => CheckResult::error_with_details(
                "Git not available",
                format!("{}\nInstall git: https://git-scm.com/downloads", e),
            ),
        }
    }

    /// Report what the next sync of `target` will do
    async fn check_target(target: &RepositoryTarget) -> CheckResult {
        let path = &target.local_path;
        if is_existing_clone(path).await {
            return CheckResult::ok_with_details(
                format!("{} will be pulled", target.url),
                path.display().to_string(),
            );
        }

        if path.exists() {
            let empty = std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty {
                return CheckResult::warning_with_details(
                    format!("{} path exists but is not a git clone", target.url),
                    format!("git clone into {} will fail", path.display()),
                );
            }
        }

        CheckResult::ok_with_details(
            format!("{} will be cloned", target.url),
            path.display().to_string(),
        )
    }

    /// Get all checks for iteration
    pub fn all_checks(&self) -> Vec<(&'static str, &CheckResult)> {
        let mut checks = vec![
            ("Git Installation", &self.git),
            ("Configuration", &self.config),
        ];
        checks.extend(self.targets.iter().map(|t| ("Repository", t)));
        checks
    }
}
