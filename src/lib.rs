//! # release-dl
//!
//! Release-triggered download and automation agent for GitHub repositories.
//!
//! release-dl watches a set of repositories for new published releases,
//! downloads a filtered subset of each release's assets exactly once, and
//! then runs a configured sequence of shell commands against the downloaded
//! files: poll → detect → fetch → execute → record.
//!
//! ## Design Philosophy
//!
//! - **Exactly-once per release** - a durable filesystem marker plus an
//!   in-process cycle lock keep overlapping polls from reprocessing a tag
//! - **Fail-soft per asset, fail-hard per release** - a failed download or
//!   task aborts one release's cycle, never the watcher or its siblings
//! - **Library-first** - the daemon binary is a thin wrapper; embedding the
//!   [`Scheduler`] in another process works the same way
//!
//! ## Quick Start
//!
//! ```no_run
//! use release_dl::{Config, Scheduler, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(std::path::Path::new(".release-dl.yaml"))?;
//!     let repos = config.resolve()?;
//!
//!     let scheduler = Scheduler::new(
//!         repos,
//!         config.poll_interval(),
//!         config.fire_once,
//!         config.shutdown_grace(),
//!     );
//!
//!     // Run with automatic signal handling
//!     run_with_shutdown(scheduler).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// GitHub Releases API client
pub mod github;
/// Durable record of processed releases
pub mod ledger;
/// Fixed-interval poll scheduling
pub mod scheduler;
/// Asset selection
pub mod selector;
/// Task execution
pub mod task_runner;
/// Per-repository release watching
pub mod watcher;

// Re-export commonly used types
pub use config::{AssetPattern, Config, Repository, Task};
pub use error::{Error, FetchError, Result};
pub use github::{Release, ReleaseAsset, RepoClient};
pub use ledger::ReleaseLedger;
pub use scheduler::Scheduler;
pub use selector::select_assets;
pub use task_runner::run_task;
pub use watcher::RepositoryWatcher;

/// Run the scheduler with graceful signal handling.
///
/// Returns when the scheduler finishes on its own (fire-once mode) or when a
/// termination signal arrives, in which case the scheduler is cancelled and
/// its in-flight cycles are drained within the configured grace window.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(scheduler: Scheduler) {
    let cancel = scheduler.cancel_token();
    let mut run = tokio::spawn(scheduler.run());

    tokio::select! {
        result = &mut run => {
            if let Err(e) = result {
                tracing::error!(error = %e, "scheduler task failed");
            }
        }
        _ = wait_for_signal() => {
            tracing::info!("shutting down, waiting for in-flight cycles");
            cancel.cancel();
            if let Err(e) = run.await {
                tracing::error!(error = %e, "scheduler task failed during shutdown");
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers,
    // tests); fall back to whatever handler can still be installed
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT (Ctrl+C)");
        }
        (Err(_), Err(_)) => {
            tracing::error!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
        }
    }
}
