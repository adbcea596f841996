//! release-dl daemon binary
//!
//! Thin wrapper around the library: parse the one CLI flag, load and resolve
//! the configuration, set up logging, and hand off to the scheduler with
//! signal-driven shutdown. Fatal configuration errors are logged and exit
//! non-zero before any polling starts.

use clap::Parser;
use release_dl::{Config, Scheduler, run_with_shutdown};
use std::path::{Path, PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "release-dl", version, about = "Watch GitHub repositories for new releases, download their assets, and run tasks")]
struct CliArgs {
    /// Path to the configuration file
    #[clap(short, long, default_value = ".release-dl.yaml")]
    config_file: PathBuf,
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("LOG_LEVEL")
        .from_env_lossy()
}

fn init_stdout_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .init();
}

/// Log to a file as JSON lines, appending across restarts
fn init_file_logging(path: &Path) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .with_env_filter(env_filter())
        .init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match Config::load(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            init_stdout_logging();
            error!(
                config_file = %args.config_file.display(),
                error = %e,
                "error loading configuration file"
            );
            std::process::exit(1);
        }
    };

    match &config.log_file {
        Some(path) => {
            if let Err(e) = init_file_logging(path) {
                init_stdout_logging();
                error!(log_file = %path.display(), error = %e, "cannot open log file");
                std::process::exit(1);
            }
        }
        None => init_stdout_logging(),
    }

    let repos = match config.resolve() {
        Ok(repos) => repos,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        repos = repos.len(),
        interval = ?config.poll_interval(),
        fire_once = config.fire_once,
        "starting release watch"
    );

    let scheduler = Scheduler::new(
        repos,
        config.poll_interval(),
        config.fire_once,
        config.shutdown_grace(),
    );
    run_with_shutdown(scheduler).await;
}
