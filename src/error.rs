//! Error types for git execution and configuration validation.

use std::path::PathBuf;

/// Errors raised while invoking the git command line tool.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// git is missing or cannot be invoked. Fatal at startup.
    #[error("git is not available: {reason}")]
    Unavailable { reason: String },

    /// The parent directory of a clone target could not be created.
    #[error("failed to create parent directory {path}: {source}")]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The git process could not be started.
    #[error("failed to run git {operation}: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// git ran but exited unsuccessfully.
    #[error("git {operation} failed ({}): {stderr}", describe_exit(.code))]
    CommandFailed {
        operation: &'static str,
        code: Option<i32>,
        stderr: String,
    },
}

impl VcsError {
    /// Creates a new unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new command failure from captured output.
    pub fn command_failed(operation: &'static str, code: Option<i32>, stderr: &[u8]) -> Self {
        Self::CommandFailed {
            operation,
            code,
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Problems found while turning the configuration into repository targets.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no repositories configured")]
    NoRepositories,

    #[error("repository {index} has no URL")]
    MissingUrl { index: usize },

    #[error("repository {index} has no local path")]
    MissingPath { index: usize },

    #[error("repository {index} has an invalid interval '{value}': {reason}")]
    InvalidInterval {
        index: usize,
        value: String,
        reason: String,
    },

    #[error("repository {index} has a zero interval; it must be positive")]
    NonPositiveInterval { index: usize },

    #[error("repository {index} uses local path {path} already used by repository {first}")]
    DuplicatePath {
        index: usize,
        first: usize,
        path: PathBuf,
    },

    #[error("repository {index} path could not be expanded: {reason}")]
    PathExpansion { index: usize, reason: String },
}
