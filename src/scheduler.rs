//! Poll scheduling
//!
//! Fires one watcher cycle per configured repository on every tick of a
//! fixed interval. Cycles are spawned concurrently and tracked in a
//! [`tokio::task::JoinSet`] so completions (and panics) are observed, the
//! set stays bounded by the per-repository cycle lock, and shutdown can
//! drain in-flight work within a grace window instead of abandoning it.
//!
//! # Example
//!
//! ```no_run
//! use release_dl::{Config, Scheduler};
//!
//! # async fn example() -> release_dl::Result<()> {
//! let config = Config::load(std::path::Path::new(".release-dl.yaml"))?;
//! let repos = config.resolve()?;
//! let scheduler = Scheduler::new(
//!     repos,
//!     config.poll_interval(),
//!     config.fire_once,
//!     config.shutdown_grace(),
//! );
//!
//! let cancel = scheduler.cancel_token();
//! tokio::spawn(async move {
//!     scheduler.run().await;
//! });
//! // later: cancel.cancel();
//! # Ok(())
//! # }
//! ```

use crate::config::Repository;
use crate::watcher::RepositoryWatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fixed-interval poll scheduler over all configured repositories
pub struct Scheduler {
    watchers: Vec<Arc<RepositoryWatcher>>,
    poll_interval: Duration,
    fire_once: bool,
    shutdown_grace: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler over the resolved repositories
    ///
    /// `fire_once` processes every repository exactly one time and then
    /// stops scheduling further ticks; used for verification and debugging.
    pub fn new(
        repos: Vec<Repository>,
        poll_interval: Duration,
        fire_once: bool,
        shutdown_grace: Duration,
    ) -> Self {
        let watchers = repos
            .into_iter()
            .map(|repo| Arc::new(RepositoryWatcher::new(Arc::new(repo))))
            .collect();

        Self {
            watchers,
            poll_interval,
            fire_once,
            shutdown_grace,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the scheduler and interrupts in-flight network I/O
    ///
    /// Clone it before calling [`Scheduler::run`]; cancelling it starts the
    /// graceful-shutdown sequence.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the scheduling loop until cancelled (or, in fire-once mode, until
    /// every repository has been processed once)
    pub async fn run(self) {
        info!(
            repos = self.watchers.len(),
            interval = ?self.poll_interval,
            fire_once = self.fire_once,
            "scheduler started"
        );

        let mut cycles: JoinSet<()> = JoinSet::new();

        if self.fire_once {
            self.spawn_cycles(&mut cycles);
            while let Some(result) = cycles.join_next().await {
                Self::observe(result);
            }
            info!("fire-once pass complete, scheduler stopped");
            return;
        }

        let mut ticks = tokio::time::interval(self.poll_interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("shutdown requested, no further ticks");
                    break;
                }
                _ = ticks.tick() => {
                    self.spawn_cycles(&mut cycles);
                }
                Some(result) = cycles.join_next(), if !cycles.is_empty() => {
                    Self::observe(result);
                }
            }
        }

        self.drain(cycles).await;
        info!("scheduler stopped");
    }

    /// Spawn one watcher cycle per repository into the join set
    fn spawn_cycles(&self, cycles: &mut JoinSet<()>) {
        for watcher in &self.watchers {
            let watcher = Arc::clone(watcher);
            let cancel = self.cancel.clone();
            cycles.spawn(async move {
                watcher.poll_once(&cancel).await;
            });
        }
    }

    /// Wait for in-flight cycles, bounded by the shutdown grace window
    async fn drain(&self, mut cycles: JoinSet<()>) {
        if !cycles.is_empty() {
            info!(in_flight = cycles.len(), "waiting for in-flight cycles");
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        loop {
            tokio::select! {
                result = cycles.join_next() => match result {
                    Some(result) => Self::observe(result),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        aborted = cycles.len(),
                        "shutdown grace period expired, aborting in-flight cycles"
                    );
                    cycles.shutdown().await;
                    break;
                }
            }
        }
    }

    /// Log the outcome of a finished cycle task
    fn observe(result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result
            && !e.is_cancelled()
        {
            error!(error = %e, "watcher cycle panicked");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release_body(tag: &str) -> serde_json::Value {
        serde_json::json!({
            "url": format!("https://example.invalid/releases/{tag}"),
            "tag_name": tag,
            "draft": false,
            "prerelease": false,
            "target_commitish": "main",
            "assets": []
        })
    }

    async fn mock_latest(server: &MockServer, repo: &str, tag: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{repo}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_body(tag)))
            .mount(server)
            .await;
    }

    fn resolved_repos(server: &MockServer, storage: &TempDir, names: &[&str]) -> Vec<Repository> {
        let repo_entries = names
            .iter()
            .map(|name| format!("  - name: {name}\n    fetch_everything: true\n"))
            .collect::<String>();
        let yaml = format!(
            "api_url: {}\nrelease_dir: {}\nrepos:\n{}",
            server.uri(),
            storage.path().display(),
            repo_entries
        );
        Config::parse(&yaml).unwrap().resolve().unwrap()
    }

    #[tokio::test]
    async fn fire_once_processes_each_repository_once_then_returns() {
        let server = MockServer::start().await;
        mock_latest(&server, "acme/tool", "v1.0.0").await;
        mock_latest(&server, "acme/other", "v2.0.0").await;

        let storage = TempDir::new().unwrap();
        let repos = resolved_repos(&server, &storage, &["acme/tool", "acme/other"]);
        let scheduler = Scheduler::new(
            repos,
            Duration::from_secs(3600),
            true,
            Duration::from_secs(5),
        );

        tokio::time::timeout(Duration::from_secs(5), scheduler.run())
            .await
            .expect("fire-once run must terminate on its own");

        let tool_marker = storage.path().join("acme/tool/v1.0.0.release");
        let other_marker = storage.path().join("acme/other/v2.0.0.release");
        assert!(tool_marker.is_file());
        assert!(other_marker.is_file());
    }

    #[tokio::test]
    async fn cancelled_scheduler_stops_promptly_despite_long_interval() {
        let server = MockServer::start().await;
        mock_latest(&server, "acme/tool", "v1.0.0").await;

        let storage = TempDir::new().unwrap();
        let repos = resolved_repos(&server, &storage, &["acme/tool"]);
        let scheduler = Scheduler::new(
            repos,
            Duration::from_secs(3600),
            false,
            Duration::from_secs(5),
        );

        let cancel = scheduler.cancel_token();
        let handle = tokio::spawn(scheduler.run());

        // let the immediate first tick land, then request shutdown
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler must stop without waiting out the interval")
            .unwrap();
    }

    #[tokio::test]
    async fn repeated_ticks_poll_the_repository_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_body("v1.0.0")))
            .expect(2..)
            .mount(&server)
            .await;

        let storage = TempDir::new().unwrap();
        let repos = resolved_repos(&server, &storage, &["acme/tool"]);
        let scheduler = Scheduler::new(
            repos,
            Duration::from_millis(50),
            false,
            Duration::from_secs(5),
        );

        let cancel = scheduler.cancel_token();
        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        handle.await.unwrap();

        // the release is recorded on the first cycle; later cycles still
        // query the API and then short-circuit on the ledger
        assert!(storage.path().join("acme/tool/v1.0.0.release").is_file());
    }
}
