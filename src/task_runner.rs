//! Task execution
//!
//! Runs one configured shell command against a release's local directory,
//! injecting release metadata through the child environment. The child's
//! stdout and stderr are forwarded line by line into the tracing sink at
//! info and error severity. The only signal surfaced to the caller is a
//! bool: true iff the process exited with status zero.

use crate::config::{Repository, Task};
use crate::github::Release;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

/// Execute one task for a downloaded release
///
/// The child environment is the current process environment plus:
/// `GITHUB_RELEASE_REPO`, `GITHUB_RELEASE_URL`, `GITHUB_RELEASE_ASSETS`
/// (semicolon-joined), `GITHUB_RELEASE_TAG`, `GITHUB_RELEASE_COMMITSH`.
/// The working directory is the release's local directory.
///
/// A non-zero exit, a failure to launch, or an exceeded task timeout is
/// logged with full context and yields `false`. Timed-out children are
/// forcibly terminated.
pub async fn run_task(
    task: &Task,
    repo: &Repository,
    release: &Release,
    work_dir: &Path,
    asset_names: &str,
) -> bool {
    let mut command = Command::new(&task.shell);
    command
        .arg(task.shell_switch)
        .arg(&task.run)
        .current_dir(work_dir)
        .env("GITHUB_RELEASE_REPO", &repo.full_name)
        .env("GITHUB_RELEASE_URL", &release.url)
        .env("GITHUB_RELEASE_ASSETS", asset_names)
        .env("GITHUB_RELEASE_TAG", &release.tag_name)
        .env("GITHUB_RELEASE_COMMITSH", &release.target_commitish)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                task = %task.name,
                error = %e,
                "task process failed to launch"
            );
            return false;
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_forwarder = forward_lines(stdout, repo, release, task, false);
    let err_forwarder = forward_lines(stderr, repo, release, task, true);

    let status = match task.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    repo = %repo.full_name,
                    tag = %release.tag_name,
                    task = %task.name,
                    timeout = ?limit,
                    "task exceeded its timeout, killing"
                );
                if let Err(e) = child.kill().await {
                    error!(
                        repo = %repo.full_name,
                        task = %task.name,
                        error = %e,
                        "failed to kill timed-out task"
                    );
                }
                let _ = out_forwarder.await;
                let _ = err_forwarder.await;
                return false;
            }
        },
        None => child.wait().await,
    };

    // pipes close when the child exits, so the forwarders finish on their own
    let _ = out_forwarder.await;
    let _ = err_forwarder.await;

    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            error!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                task = %task.name,
                code = ?status.code(),
                "task process exited with failure"
            );
            false
        }
        Err(e) => {
            error!(
                repo = %repo.full_name,
                tag = %release.tag_name,
                task = %task.name,
                error = %e,
                "task process not successful"
            );
            false
        }
    }
}

/// Forward a child pipe into the tracing sink, line-buffered
fn forward_lines(
    pipe: Option<impl AsyncRead + Unpin + Send + 'static>,
    repo: &Repository,
    release: &Release,
    task: &Task,
    is_stderr: bool,
) -> tokio::task::JoinHandle<()> {
    let repo = repo.full_name.clone();
    let tag = release.tag_name.clone();
    let task = task.name.clone();

    tokio::spawn(async move {
        let Some(pipe) = pipe else { return };
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                error!(repo = %repo, tag = %tag, task = %task, "{}", line);
            } else {
                info!(repo = %repo, tag = %tag, task = %task, "{}", line);
            }
        }
    })
}
