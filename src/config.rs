use anyhow::{Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration file looked up relative to the working directory before
/// falling back to the XDG location.
pub const LOCAL_CONFIG_PATH: &str = "./configs/config.yaml";

/// Longest accepted sync interval, roughly 292 years (`i64::MAX` nanoseconds).
/// Timer deadlines are computed by adding the interval to the current instant.
pub const MAX_INTERVAL: Duration = Duration::from_nanos(i64::MAX as u64);

/// Main configuration structure for git-archiver
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Repositories to mirror
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// One repository entry as written in the configuration file
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RepositoryConfig {
    /// Remote URL passed to `git clone`
    #[serde(default)]
    pub url: String,

    /// Time between syncs, e.g. "5m", "1h30m" or a number of seconds
    #[serde(default)]
    pub interval: Option<IntervalSpec>,

    /// Local directory holding the clone
    #[serde(default)]
    pub path: String,
}

/// Interval as it appears in YAML: either a duration string or whole seconds
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum IntervalSpec {
    Seconds(i64),
    Text(String),
}

/// A validated repository to mirror.
///
/// Built once at startup and never mutated; each scheduler task holds the
/// only handle to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub url: String,
    pub local_path: PathBuf,
    pub interval: Duration,
}

impl Config {
    /// Resolve which configuration file to load.
    ///
    /// An explicit path wins; otherwise `./configs/config.yaml` is used when
    /// present, then the XDG config location.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_PATH);
        if local.exists() {
            return Ok(local);
        }

        Self::default_config_path()
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("git-archiver").join("config.yaml"))
    }

    /// Validate every repository entry and build the scheduler targets.
    ///
    /// Entries are numbered from 1 in error messages. Two entries whose
    /// paths clean to the same location are rejected, since their tasks
    /// would write the same directory concurrently.
    pub fn targets(&self) -> Result<Vec<RepositoryTarget>, ConfigError> {
        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let mut seen: HashMap<PathBuf, usize> = HashMap::new();
        let mut targets = Vec::with_capacity(self.repositories.len());

        for (i, repo) in self.repositories.iter().enumerate() {
            let index = i + 1;
            let target = repo.to_target(index)?;

            if let Some(first) = seen.insert(target.local_path.clone(), index) {
                return Err(ConfigError::DuplicatePath {
                    index,
                    first,
                    path: target.local_path,
                });
            }

            targets.push(target);
        }

        Ok(targets)
    }
}

impl RepositoryConfig {
    fn to_target(&self, index: usize) -> Result<RepositoryTarget, ConfigError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingUrl { index });
        }

        let path = self.path.trim();
        if path.is_empty() {
            return Err(ConfigError::MissingPath { index });
        }

        let interval = match &self.interval {
            None => {
                return Err(ConfigError::InvalidInterval {
                    index,
                    value: String::new(),
                    reason: "missing".to_string(),
                })
            }
            Some(spec) => spec.to_duration().map_err(|reason| ConfigError::InvalidInterval {
                index,
                value: spec.to_string(),
                reason,
            })?,
        };
        if interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval { index });
        }

        let expanded = shellexpand::full(path).map_err(|e| ConfigError::PathExpansion {
            index,
            reason: e.to_string(),
        })?;

        Ok(RepositoryTarget {
            url: url.to_string(),
            local_path: PathBuf::from(expanded.as_ref()).clean(),
            interval,
        })
    }
}

impl IntervalSpec {
    /// Convert to a duration; negative values and values above
    /// [`MAX_INTERVAL`] are rejected, zero is returned as is.
    pub fn to_duration(&self) -> Result<Duration, String> {
        let duration = match self {
            IntervalSpec::Seconds(secs) if *secs < 0 => {
                return Err("negative intervals are not allowed".to_string())
            }
            IntervalSpec::Seconds(secs) => Duration::from_secs(*secs as u64),
            IntervalSpec::Text(text) => parse_interval(text)?,
        };

        if duration > MAX_INTERVAL {
            return Err(format!(
                "intervals longer than {}h are not supported",
                MAX_INTERVAL.as_secs() / 3600
            ));
        }
        Ok(duration)
    }
}

impl std::fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalSpec::Seconds(secs) => write!(f, "{}", secs),
            IntervalSpec::Text(text) => f.write_str(text),
        }
    }
}

/// Parse a duration string such as "90s", "5m", "1h30m", "1.5h" or "250ms".
///
/// A bare number is taken as seconds.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s.starts_with('-') {
        return Err("negative intervals are not allowed".to_string());
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("expected a number in '{}'", input));
        }
        let number = &rest[..num_len];
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            "" => return Err(format!("missing unit in '{}'", input)),
            unit => return Err(format!("unknown unit '{}' in '{}'", unit, input)),
        };
        rest = &rest[unit_len..];

        let nanos = scaled_nanos(number, nanos_per_unit)
            .ok_or_else(|| format!("invalid number '{}' in '{}'", number, input))?;
        total_nanos = total_nanos
            .checked_add(nanos)
            .ok_or_else(|| format!("duration '{}' is too large", input))?;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| format!("duration '{}' is too large", input))?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

// Whole part is exact; the fraction is rounded to the nearest nanosecond.
fn scaled_nanos(number: &str, nanos_per_unit: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: f64 = if fraction.is_empty() {
        0.0
    } else {
        format!("0.{}", fraction).parse().ok()?
    };

    whole
        .checked_mul(nanos_per_unit)?
        .checked_add((fraction * nanos_per_unit as f64).round() as u128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    // Helper function to create a temporary config directory
    fn setup_test_config_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("git-archiver");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        (temp_dir, config_dir)
    }

    fn repo(url: &str, interval: &str, path: &str) -> RepositoryConfig {
        RepositoryConfig {
            url: url.to_string(),
            interval: Some(IntervalSpec::Text(interval.to_string())),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
repositories:
  - url: https://example.com/repo.git
    interval: 5m
    path: /data/repo
  - url: git@example.com:team/tools.git
    interval: 3600
    path: /data/tools
"#;
        let config = Config::from_yaml(yaml_content).expect("Failed to parse YAML");
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(
            config.repositories[0],
            repo("https://example.com/repo.git", "5m", "/data/repo")
        );
        assert_eq!(config.repositories[1].interval, Some(IntervalSpec::Seconds(3600)));

        let targets = config.targets().expect("Config should validate");
        assert_eq!(targets[0].interval, Duration::from_secs(300));
        assert_eq!(targets[0].local_path, PathBuf::from("/data/repo"));
        assert_eq!(targets[1].interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Config::from_yaml("repositories: [").is_err());
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yaml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let config_path = config_dir.join("config.yaml");
        std::fs::write(
            &config_path,
            concat!(
                "repositories:\n",
                "  - url: https://example.com/a.git\n",
                "    interval: 1h30m\n",
                "    path: /srv/a\n",
            ),
        )
        .expect("Failed to write config");

        let loaded = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(
            loaded.repositories,
            vec![repo("https://example.com/a.git", "1h30m", "/srv/a")]
        );
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("git-archiver"));
        assert!(default_path.to_string_lossy().ends_with("config.yaml"));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let explicit = PathBuf::from("/etc/git-archiver.yaml");
        assert_eq!(Config::resolve_path(Some(explicit.clone())).unwrap(), explicit);
    }

    #[test]
    fn test_targets_rejects_empty_list() {
        assert_eq!(Config::default().targets(), Err(ConfigError::NoRepositories));
    }

    #[test]
    fn test_targets_rejects_missing_fields() {
        let mut config = Config::default();
        config.repositories.push(repo("https://example.com/a.git", "1m", "/srv/a"));
        config.repositories.push(repo("  ", "1m", "/srv/b"));
        assert_eq!(config.targets(), Err(ConfigError::MissingUrl { index: 2 }));

        config.repositories[1] = repo("https://example.com/b.git", "1m", "");
        assert_eq!(config.targets(), Err(ConfigError::MissingPath { index: 2 }));
    }

    #[test]
    fn test_targets_rejects_out_of_range_intervals() {
        let mut config = Config::default();
        config.repositories.push(RepositoryConfig {
            url: "https://example.com/a.git".to_string(),
            interval: Some(IntervalSpec::Seconds(i64::MAX)),
            path: "/srv/a".to_string(),
        });
        assert_matches!(
            config.targets(),
            Err(ConfigError::InvalidInterval { index: 1, ref value, .. })
                if value == &i64::MAX.to_string()
        );

        config.repositories[0].interval = Some(IntervalSpec::Text("2562048h".to_string()));
        assert_matches!(
            config.targets(),
            Err(ConfigError::InvalidInterval { index: 1, .. })
        );

        // Just under the limit is still accepted
        config.repositories[0].interval = Some(IntervalSpec::Text("2562047h".to_string()));
        let targets = config.targets().expect("interval below the limit");
        assert_eq!(targets[0].interval, Duration::from_secs(2_562_047 * 3600));
    }

    #[test]
    fn test_targets_rejects_bad_intervals() {
        let mut config = Config::default();
        config.repositories.push(repo("https://example.com/a.git", "0s", "/srv/a"));
        assert_eq!(
            config.targets(),
            Err(ConfigError::NonPositiveInterval { index: 1 })
        );

        config.repositories[0].interval = Some(IntervalSpec::Seconds(-5));
        assert_matches!(
            config.targets(),
            Err(ConfigError::InvalidInterval { index: 1, .. })
        );

        config.repositories[0].interval = Some(IntervalSpec::Text("soon".to_string()));
        assert_matches!(
            config.targets(),
            Err(ConfigError::InvalidInterval { index: 1, ref value, .. }) if value == "soon"
        );

        config.repositories[0].interval = None;
        assert_matches!(
            config.targets(),
            Err(ConfigError::InvalidInterval { index: 1, ref reason, .. }) if reason == "missing"
        );
    }

    #[test]
    fn test_targets_rejects_duplicate_paths() {
        let mut config = Config::default();
        config.repositories.push(repo("https://example.com/a.git", "1m", "/srv/mirror"));
        config.repositories.push(repo("https://example.com/b.git", "1m", "/srv/other"));
        config.repositories.push(repo("https://example.com/c.git", "1m", "/srv/./x/../mirror/"));

        assert_eq!(
            config.targets(),
            Err(ConfigError::DuplicatePath {
                index: 3,
                first: 1,
                path: PathBuf::from("/srv/mirror"),
            })
        );
    }

    #[test]
    #[serial]
    fn test_targets_expand_environment() {
        env::set_var("TEST_GIT_ARCHIVER_HOME", "/test/home");

        let mut config = Config::default();
        config
            .repositories
            .push(repo("https://example.com/a.git", "10m", "${TEST_GIT_ARCHIVER_HOME}/mirrors/a"));

        let targets = config.targets().expect("Failed to build targets");
        assert_eq!(targets[0].local_path, PathBuf::from("/test/home/mirrors/a"));

        env::remove_var("TEST_GIT_ARCHIVER_HOME");
    }

    #[test]
    #[serial]
    fn test_targets_undefined_variable() {
        env::remove_var("TEST_GIT_ARCHIVER_UNSET");

        let mut config = Config::default();
        config
            .repositories
            .push(repo("https://example.com/a.git", "10m", "$TEST_GIT_ARCHIVER_UNSET/a"));

        assert_matches!(config.targets(), Err(ConfigError::PathExpansion { index: 1, .. }));
    }

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_interval("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_interval("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_interval(" 42 "), Ok(Duration::from_secs(42)));
        assert_eq!(parse_interval("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn test_parse_interval_errors() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("-5m").is_err());
        assert!(parse_interval("5").is_ok());
        assert!(parse_interval("5x").is_err());
        assert!(parse_interval("m").is_err());
        assert!(parse_interval("1h30").is_err());
    }

    #[quickcheck_macros::quickcheck]
    fn prop_whole_minutes_round_trip(minutes: u32) -> bool {
        parse_interval(&format!("{}m", minutes)) == Ok(Duration::from_secs(minutes as u64 * 60))
    }

    #[quickcheck_macros::quickcheck]
    fn prop_hours_and_minutes_add_up(hours: u16, minutes: u16) -> bool {
        parse_interval(&format!("{}h{}m", hours, minutes))
            == Ok(Duration::from_secs(hours as u64 * 3600 + minutes as u64 * 60))
    }
}
