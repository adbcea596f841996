//! Per-repository release watching
//!
//! One [`RepositoryWatcher`] per configured repository. Each poll tick runs a
//! single pass: query the latest release, skip drafts and prereleases,
//! consult the ledger, download the selected assets, run the configured
//! tasks in order, and record the release on full success. Every failure is
//! handled here; nothing propagates to the scheduler.

use crate::config::Repository;
use crate::ledger::ReleaseLedger;
use crate::selector::select_assets;
use crate::task_runner::run_task;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Watches one repository for new published releases
///
/// Holds the per-repository cycle lock: poll ticks that arrive while a
/// previous cycle is still running are rejected outright instead of racing
/// it, so at most one cycle per repository touches the network, the release
/// directory, or the ledger at a time. The durable marker remains the
/// crash-recovery record.
pub struct RepositoryWatcher {
    repo: Arc<Repository>,
    ledger: ReleaseLedger,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl RepositoryWatcher {
    /// Create a watcher for one resolved repository
    pub fn new(repo: Arc<Repository>) -> Self {
        let ledger = ReleaseLedger::new(&repo.release_dir);
        Self {
            repo,
            ledger,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The repository this watcher polls
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Run one poll cycle
    ///
    /// Strictly sequential within the cycle: query, select, download all,
    /// run tasks in order, record. The cancellation token interrupts the
    /// release query and asset downloads; task subprocesses run to
    /// completion regardless (bounded only by the optional task timeout).
    pub async fn poll_once(&self, cancel: &CancellationToken) {
        let repo = &self.repo;

        let _cycle = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    repo = %repo.full_name,
                    "previous cycle still running, skipping this tick"
                );
                return;
            }
        };

        let release = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(repo = %repo.full_name, "shutdown requested, abandoning cycle");
                return;
            }
            result = repo.client.latest_release() => match result {
                Ok(release) => release,
                Err(e) => {
                    error!(
                        repo = %repo.full_name,
                        error = %e,
                        "error checking for latest release"
                    );
                    return;
                }
            }
        };

        if release.draft || release.prerelease {
            info!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                "skipped draft/pre-release"
            );
            return;
        }

        if self.ledger.is_recorded(&release.tag_name).await {
            info!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                "release already processed"
            );
            return;
        }

        info!(
            repo = %repo.full_name,
            tag = %release.tag_name,
            "new release found"
        );

        let release_dir = repo.release_dir.join(&release.tag_name);
        if let Err(e) = tokio::fs::create_dir_all(&release_dir).await {
            error!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                error = %e,
                "error creating download destination"
            );
            return;
        }

        let selected = select_assets(
            &release.assets,
            &repo.patterns,
            repo.fetch_everything,
            repo.dedupe_assets,
        );

        info!(
            repo = %repo.full_name,
            tag = %release.tag_name,
            count = selected.len(),
            "fetching assets"
        );

        let mut all_fetched = true;
        for asset in &selected {
            let dest = release_dir.join(&asset.name);
            info!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                asset = %asset.name,
                dest = %dest.display(),
                "fetching asset"
            );

            let fetched = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(
                        repo = %repo.full_name,
                        tag = %release.tag_name,
                        "shutdown requested, abandoning cycle mid-download"
                    );
                    return;
                }
                result = repo.client.download_asset(asset, &dest) => result,
            };

            // keep trying the remaining assets, but the release as a whole
            // has failed: no tasks run and no marker is written this cycle
            if let Err(e) = fetched {
                error!(error = %e, "asset fetch failed");
                all_fetched = false;
            }
        }

        if !all_fetched {
            warn!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                "one or more assets failed, tasks skipped; release will be retried next poll"
            );
            return;
        }

        let asset_names = selected
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        if !repo.tasks.is_empty() {
            info!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                "running tasks"
            );
        }

        for task in &repo.tasks {
            if !run_task(task, repo, &release, &release_dir, &asset_names).await {
                warn!(
                    repo = %repo.full_name,
                    tag = %release.tag_name,
                    task = %task.name,
                    "task failed, remaining tasks skipped; release will be retried next poll"
                );
                return;
            }
        }

        match self.ledger.record(&release.tag_name).await {
            Ok(()) => {
                info!(
                    repo = %repo.full_name,
                    tag = %release.tag_name,
                    "release recorded"
                );
            }
            Err(e) => {
                // tasks are not rolled back; the release stays eligible for
                // reprocessing on a future poll
                error!(
                    repo = %repo.full_name,
                    tag = %release.tag_name,
                    error = %e,
                    "error saving release marker"
                );
            }
        }
    }
}
