/// Common test utilities and helpers for git-archiver tests

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Test configuration helper: a temp dir holding an upstream repository,
/// mirror destinations and a config file
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    /// Create an upstream repository with one commit and return its path
    pub fn create_upstream(&self, name: &str) -> PathBuf {
        let upstream = self.temp_dir.child("upstream").child(name);
        upstream.create_dir_all().expect("Failed to create upstream dir");

        git(upstream.path(), &["init", "--quiet"]);
        self.commit_file(upstream.path(), "README.md", "# upstream\n");
        upstream.path().to_path_buf()
    }

    /// Write a file into `repo` and commit it
    pub fn commit_file(&self, repo: &Path, name: &str, content: &str) {
        std::fs::write(repo.join(name), content).expect("Failed to write file");
        git(repo, &["add", name]);
        git(
            repo,
            &[
                "-c",
                "user.name=git-archiver tests",
                "-c",
                "user.email=tests@example.com",
                "commit",
                "--quiet",
                "-m",
                &format!("add {}", name),
            ],
        );
    }

    /// Path under the temp dir where a mirror should live
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.temp_dir.child("mirrors").child(name).path().to_path_buf()
    }

    /// Write a config file listing `(url, interval, path)` entries
    pub fn create_config(&self, repos: &[(&str, &str, &Path)]) -> PathBuf {
        let mut content = String::from("repositories:\n");
        for (url, interval, path) in repos {
            content.push_str(&format!(
                "  - url: \"{}\"\n    interval: {}\n    path: \"{}\"\n",
                url,
                interval,
                path.display()
            ));
        }
        self.create_test_config(&content)
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config = self.temp_dir.child("config.yaml");
        config.write_str(content).expect("Failed to write test config");
        config.path().to_path_buf()
    }
}

/// Run git in `dir`, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> Output {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Run the git-archiver binary with `args`
#[allow(dead_code)]
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_git-archiver"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute git-archiver")
}

/// Assertion helpers for test validation
#[allow(dead_code)]
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
