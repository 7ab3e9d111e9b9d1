use crate::api::{Backend, HttpBackend};
use crate::logging::{self, LogTarget};
use crate::model::{ClientConfig, Cursor, PageSize, ResultsPage, RunOutcome};
use crate::runner::RunTestController;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "speedy-dash",
    version,
    about = "Terminal dashboard for a speed test results backend"
)]
#[command(group(ArgGroup::new("mode").args(["json", "text", "run", "status"])))]
pub struct Cli {
    /// Base URL of the results backend
    #[arg(long, env = "SPEEDY_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Rows per page: 10, 25, 50 or 100
    #[arg(long, env = "SPEEDY_ROWS_PER_PAGE", default_value = "25")]
    pub rows_per_page: PageSize,

    /// How often the runner status is polled
    #[arg(long, env = "SPEEDY_POLL_INTERVAL", default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// How long transient notices stay on screen
    #[arg(long, env = "SPEEDY_NOTICE_TIMEOUT", default_value = "2s")]
    pub notice_timeout: humantime::Duration,

    /// Per-request HTTP timeout
    #[arg(long, env = "SPEEDY_REQUEST_TIMEOUT", default_value = "5s")]
    pub request_timeout: humantime::Duration,

    /// Log file used while the TUI owns the terminal (default: user cache dir)
    #[arg(long, env = "SPEEDY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Fetch the page addressed by this backend-issued cursor (with --json/--text)
    #[arg(long)]
    pub cursor: Option<String>,

    /// Print one results page as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print one results page as a text table and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Ask the backend to start a speed test and exit
    #[arg(long)]
    pub run: bool,

    /// Print the runner status and exit
    #[arg(long)]
    pub status: bool,
}

impl Cli {
    fn is_one_shot(&self) -> bool {
        self.json || self.text || self.run || self.status
    }

    /// The TUI owns the terminal, so it logs to a file; every other mode logs to stderr.
    pub fn log_target(&self) -> LogTarget {
        if cfg!(feature = "tui") && !self.is_one_shot() {
            LogTarget::File(
                self.log_file
                    .clone()
                    .unwrap_or_else(logging::default_log_file),
            )
        } else {
            LogTarget::Stderr
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.cursor.is_some() && !(args.json || args.text) {
        return Err(anyhow::anyhow!(
            "--cursor can only be used with --json or --text."
        ));
    }

    let cfg = build_config(&args)?;
    let backend = Arc::new(HttpBackend::new(&cfg)?);

    if args.run {
        return run_once(backend, &cfg).await;
    }
    if args.status {
        return print_status(backend.as_ref()).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg, backend).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return print_page(&args, &cfg, backend.as_ref()).await;
        }
    }

    print_page(&args, &cfg, backend.as_ref()).await
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<ClientConfig> {
    let poll_interval = Duration::from(args.poll_interval);
    if poll_interval.is_zero() {
        return Err(anyhow::anyhow!("--poll-interval must be greater than zero"));
    }

    Ok(ClientConfig {
        base_url: args.base_url.clone(),
        rows_per_page: args.rows_per_page,
        poll_interval,
        notice_timeout: Duration::from(args.notice_timeout),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("speedy-dash/{}", env!("CARGO_PKG_VERSION")),
    })
}

async fn fetch_requested_page(
    backend: &dyn Backend,
    cfg: &ClientConfig,
    cursor: Option<&str>,
) -> Result<ResultsPage> {
    let page = match cursor {
        Some(raw) => backend.fetch_page(&Cursor::new(raw)).await,
        None => backend.fetch_first_page(cfg.rows_per_page.limit()).await,
    };
    page.context("failed to fetch results")
}

fn render_page(page: &ResultsPage, json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string_pretty(page)?]);
    }
    Ok(crate::text_summary::build_text_summary(page).lines)
}

async fn print_page(args: &Cli, cfg: &ClientConfig, backend: &dyn Backend) -> Result<()> {
    let page = fetch_requested_page(backend, cfg, args.cursor.as_deref()).await?;
    let (out_tx, out_handle) = spawn_output_writer();
    for line in render_page(&page, args.json)? {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Rejected and indeterminate outcomes are reports, not failures.
fn outcome_line(outcome: RunOutcome) -> OutputLine {
    match outcome {
        RunOutcome::Accepted => OutputLine::Stdout(outcome.to_message()),
        RunOutcome::Rejected => OutputLine::Stderr(outcome.to_message()),
        RunOutcome::Indeterminate { .. } => {
            OutputLine::Stderr(format!("warning: {}", outcome.to_message()))
        }
    }
}

async fn run_once(backend: Arc<dyn Backend>, cfg: &ClientConfig) -> Result<()> {
    let controller = RunTestController::new(backend, cfg.notice_timeout);
    let outcome = controller
        .run_test()
        .await
        .context("failed to request a test run")?;

    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(outcome_line(outcome));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn print_status(backend: &dyn Backend) -> Result<()> {
    let status = backend
        .poll_status()
        .await
        .context("failed to read runner status")?;
    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stdout(status.to_string()));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
