use anyhow::Context;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "speedy-dash";
const LOG_FILE: &str = "speedy-dash.log";

/// Where diagnostics go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Keeps the non-blocking file writer flushing until dropped.
#[must_use]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

pub fn default_log_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(LOG_FILE)
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(LOG_FILE));
    (dir, file)
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init(target: LogTarget) -> anyhow::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
                .context("failed to install log subscriber")?;
            Ok(LogGuard { _worker: None })
        }
        LogTarget::File(path) => {
            let (dir, file) = split_log_path(&path);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, &file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
                .context("failed to install log subscriber")?;
            Ok(LogGuard {
                _worker: Some(guard),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_file_lives_under_the_app_dir() {
        let path = default_log_file();
        assert!(path.ends_with("speedy-dash/speedy-dash.log"));
    }

    #[test]
    fn bare_file_name_logs_to_the_working_dir() {
        let (dir, file) = split_log_path(Path::new("dash.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, PathBuf::from("dash.log"));

        let (dir, file) = split_log_path(Path::new("/var/log/dash/out.log"));
        assert_eq!(dir, PathBuf::from("/var/log/dash"));
        assert_eq!(file, PathBuf::from("out.log"));
    }
}
