//! Tracing bootstrap: a stderr layer for live progress plus a per-run
//! log file, keeping stdout clean for the report.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Returns the log file path and the
/// writer guard; the guard must stay alive for the whole run or the
/// tail of the file log is lost.
pub fn init(log_dir: &Path) -> Result<(PathBuf, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory: {}", log_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let path = log_dir.join(format!("run-{stamp}.log"));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("TOIAWASE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok((path, guard))
}
