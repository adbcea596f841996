//! Configuration types for release-dl
//!
//! The configuration document is YAML, loaded once at startup and strictly
//! validated: unknown fields, malformed repository names, missing asset
//! selection rules, and invalid glob patterns all reject the document before
//! any polling starts. [`Config::resolve`] turns the validated document into
//! immutable per-repository [`Repository`] values, each owning its own
//! authenticated client and storage directory.

use crate::error::{Error, Result};
use crate::github::{DEFAULT_API_URL, RepoClient};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// A glob expression for selecting release assets by name
///
/// Compiled once at configuration-parse time; a pattern that fails to compile
/// rejects the whole document.
#[derive(Clone, Debug)]
pub struct AssetPattern {
    pattern: String,
    matcher: glob::Pattern,
}

impl AssetPattern {
    /// Compile a glob expression
    ///
    /// # Errors
    /// Returns a configuration error if the expression is not a valid glob.
    pub fn compile(pattern: &str) -> Result<Self> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            Error::config(
                format!("invalid asset glob pattern '{}': {}", pattern, e),
                Some("repos.assets"),
            )
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Whether the pattern matches an asset name
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    /// The original glob expression
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl<'de> Deserialize<'de> for AssetPattern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        AssetPattern::compile(&pattern).map_err(serde::de::Error::custom)
    }
}

/// One task entry as written in the configuration document
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEntry {
    /// Display name, used in log lines
    pub name: String,
    /// Shell command string, run through `{shell} {switch} {run}`
    pub run: String,
}

/// One repository entry as written in the configuration document
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoEntry {
    /// Full name in `owner/name` form
    pub name: String,

    /// Access token override; inherits the top-level token if absent
    #[serde(default)]
    pub access_token: Option<String>,

    /// Storage directory override; defaults to `{release_dir}/{owner}/{name}`
    #[serde(default)]
    pub release_dir: Option<PathBuf>,

    /// Glob patterns selecting which assets to fetch
    #[serde(default)]
    pub assets: Vec<AssetPattern>,

    /// Fetch every asset, ignoring patterns
    #[serde(default)]
    pub fetch_everything: bool,

    /// Commands to run, in order, after a release is fully downloaded
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// The whole configuration document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default access token for repositories without their own
    #[serde(default)]
    pub access_token: Option<String>,

    /// Root storage directory; defaults to `{home}/release-dl`
    #[serde(default)]
    pub release_dir: Option<PathBuf>,

    /// Log file path; absent means log to standard output
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Shell interpreter for tasks (default `/bin/sh`, `cmd.exe` on Windows)
    #[serde(default = "default_task_shell")]
    pub task_shell: String,

    /// Seconds between poll ticks (default 60)
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// HTTP timeout in seconds, shared by release queries and asset
    /// downloads (default 30)
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout: u64,

    /// Process every repository exactly once, then stop (debugging aid)
    #[serde(default)]
    pub fire_once: bool,

    /// API base URL, for GitHub Enterprise hosts
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Drop repeat appearances when an asset matches several patterns
    #[serde(default)]
    pub dedupe_assets: bool,

    /// Kill a task that runs longer than this many seconds; absent means no
    /// limit
    #[serde(default)]
    pub task_timeout_seconds: Option<u64>,

    /// Seconds to wait for in-flight cycles on shutdown (default 5)
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// Watched repositories (at least one required)
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

fn default_task_shell() -> String {
    if cfg!(windows) {
        "cmd.exe".to_string()
    } else {
        "/bin/sh".to_string()
    }
}

fn default_poll_seconds() -> u64 {
    60
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

fn shell_switch() -> &'static str {
    if cfg!(windows) { "/c" } else { "-c" }
}

impl Config {
    /// Load and parse the configuration document at `path`
    ///
    /// Parsing is strict: unknown fields and invalid glob patterns reject the
    /// document. Cross-field validation happens in [`Config::resolve`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse a configuration document from a string
    ///
    /// # Errors
    /// Returns an error if the document does not parse or a glob pattern is
    /// invalid.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Interval between poll ticks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }

    /// Shared HTTP timeout for release queries and asset downloads
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Grace window for in-flight cycles on shutdown
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Validate the document and build the runtime repositories
    ///
    /// Splits each `owner/name`, checks that every repository has an asset
    /// selection rule, inherits defaults, creates storage directories, and
    /// constructs each repository's authenticated client.
    ///
    /// # Errors
    /// Any validation failure is fatal: the process must not start polling
    /// with a partially valid configuration.
    pub fn resolve(&self) -> Result<Vec<Repository>> {
        if self.repos.is_empty() {
            return Err(Error::config("no repositories to watch", Some("repos")));
        }

        let root_dir = match &self.release_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| {
                    Error::config("cannot determine home directory", Some("release_dir"))
                })?
                .join("release-dl"),
        };

        let mut repositories = Vec::with_capacity(self.repos.len());

        for entry in &self.repos {
            if entry.assets.is_empty() && !entry.fetch_everything {
                return Err(Error::config(
                    format!(
                        "{}: missing assets; set `fetch_everything: true` to fetch all assets",
                        entry.name
                    ),
                    Some("repos.assets"),
                ));
            }

            let (owner, repo) = match entry.name.split_once('/') {
                Some((owner, repo))
                    if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
                {
                    (owner, repo)
                }
                _ => {
                    return Err(Error::config(
                        format!(
                            "invalid repository name: {}. must be {{OWNER}}/{{REPO}}",
                            entry.name
                        ),
                        Some("repos.name"),
                    ));
                }
            };

            let token = entry
                .access_token
                .clone()
                .or_else(|| self.access_token.clone());

            let release_dir = entry
                .release_dir
                .clone()
                .unwrap_or_else(|| root_dir.join(owner).join(repo));

            std::fs::create_dir_all(&release_dir).map_err(|e| {
                Error::config(
                    format!(
                        "failed to create release directory {} for repo {}: {}",
                        release_dir.display(),
                        entry.name,
                        e
                    ),
                    Some("repos.release_dir"),
                )
            })?;

            let client = RepoClient::new(&self.api_url, owner, repo, token, self.http_timeout())?;

            let task_timeout = self.task_timeout_seconds.map(Duration::from_secs);
            let tasks = entry
                .tasks
                .iter()
                .map(|t| Task {
                    name: t.name.clone(),
                    run: t.run.clone(),
                    shell: self.task_shell.clone(),
                    shell_switch: shell_switch(),
                    timeout: task_timeout,
                })
                .collect();

            repositories.push(Repository {
                full_name: entry.name.clone(),
                owner: owner.to_string(),
                repo: repo.to_string(),
                release_dir,
                patterns: entry.assets.clone(),
                fetch_everything: entry.fetch_everything,
                dedupe_assets: self.dedupe_assets,
                tasks,
                client,
            });
        }

        Ok(repositories)
    }
}

/// A fully resolved task, ready to execute
#[derive(Clone, Debug)]
pub struct Task {
    /// Display name, used in log lines
    pub name: String,
    /// Shell command string
    pub run: String,
    /// Shell interpreter to invoke
    pub shell: String,
    /// The interpreter's "run a single command string" switch
    pub shell_switch: &'static str,
    /// Enforced run-time limit; `None` means the task may run forever
    pub timeout: Option<Duration>,
}

/// One watched repository after validation and resolution
///
/// Immutable for its lifetime. Owns its credential/client handle, its storage
/// directory, its compiled asset patterns, and its ordered task list.
#[derive(Clone, Debug)]
pub struct Repository {
    /// Full `owner/name`
    pub full_name: String,
    /// Owner half of the full name
    pub owner: String,
    /// Repository half of the full name
    pub repo: String,
    /// Local storage root for this repository's releases
    pub release_dir: PathBuf,
    /// Compiled asset selection patterns
    pub patterns: Vec<AssetPattern>,
    /// Fetch every asset, ignoring patterns
    pub fetch_everything: bool,
    /// Drop repeat appearances on overlapping patterns
    pub dedupe_assets: bool,
    /// Tasks to run after a successful download, in declaration order
    pub tasks: Vec<Task>,
    /// Authenticated API client
    pub client: RepoClient,
}
