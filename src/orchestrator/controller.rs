//! Dashboard controller.
//!
//! Single writer of the pagination state. UI commands come in, page fetches and
//! run requests are spawned as one-shot tasks, and snapshots go back out as
//! events for presentation layers.

use crate::api::{self, Backend};
use crate::model::{ClientConfig, DashboardEvent, InfoEvent, PageSize, ResultsPage, RunnerStatus};
use crate::pagination::{Applied, FetchRequest, FetchTicket, PaginationState};
use crate::runner::{RunTestController, StatusPoller};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    NextPage,
    PrevPage,
    SetRowsPerPage(PageSize),
    Refresh,
    RunTest,
    Quit,
}

/// A finished page fetch, tagged with the ticket it answers.
struct FetchDone {
    seq: u64,
    result: api::Result<ResultsPage>,
}

fn spawn_fetch(
    backend: &Arc<dyn Backend>,
    ticket: FetchTicket,
    done_tx: &UnboundedSender<FetchDone>,
) {
    let backend = backend.clone();
    let done_tx = done_tx.clone();
    debug!(seq = ticket.seq, request = ?ticket.request, "issuing page fetch");
    tokio::spawn(async move {
        let result = match &ticket.request {
            FetchRequest::First(size) => backend.fetch_first_page(size.limit()).await,
            FetchRequest::Cursor(cursor) => backend.fetch_page(cursor).await,
        };
        let _ = done_tx.send(FetchDone {
            seq: ticket.seq,
            result,
        });
    });
}

fn publish(event_tx: &UnboundedSender<DashboardEvent>, pagination: &PaginationState) {
    let _ = event_tx.send(DashboardEvent::Pagination(pagination.view().clone()));
}

/// Drive the dashboard until `Quit` arrives or the command channel closes.
pub(crate) async fn run_controller(
    cfg: &ClientConfig,
    backend: Arc<dyn Backend>,
    event_tx: UnboundedSender<DashboardEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let notice_tx = event_tx.clone();
    let runner = Arc::new(
        RunTestController::new(backend.clone(), cfg.notice_timeout).on_rejected(move |notice| {
            let _ = notice_tx.send(DashboardEvent::Notice(notice));
        }),
    );

    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let poller = StatusPoller::start(runner.clone(), cfg.poll_interval, status_tx);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchDone>();
    let mut pagination = PaginationState::new(cfg.rows_per_page);
    spawn_fetch(&backend, pagination.load_first_page(), &done_tx);
    publish(&event_tx, &pagination);

    // Last successfully polled status; failed polls do not reset it.
    let mut last_status: Option<RunnerStatus> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::NextPage) => match pagination.next_page() {
                        Some(ticket) => {
                            spawn_fetch(&backend, ticket, &done_tx);
                            publish(&event_tx, &pagination);
                        }
                        None => {
                            let _ = event_tx.send(DashboardEvent::Info(InfoEvent::NoNextPage));
                        }
                    },
                    Some(UiCommand::PrevPage) => match pagination.prev_page() {
                        Some(ticket) => {
                            spawn_fetch(&backend, ticket, &done_tx);
                            publish(&event_tx, &pagination);
                        }
                        None => {
                            let _ = event_tx.send(DashboardEvent::Info(InfoEvent::NoPrevPage));
                        }
                    },
                    Some(UiCommand::SetRowsPerPage(size)) => {
                        if let Some(ticket) = pagination.set_rows_per_page(size) {
                            info!(rows = size.get(), "rows per page changed");
                            spawn_fetch(&backend, ticket, &done_tx);
                            publish(&event_tx, &pagination);
                        }
                    }
                    Some(UiCommand::Refresh) => {
                        spawn_fetch(&backend, pagination.load_first_page(), &done_tx);
                        publish(&event_tx, &pagination);
                    }
                    Some(UiCommand::RunTest) => {
                        let runner = runner.clone();
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            match runner.run_test().await {
                                Ok(outcome) => {
                                    let _ = event_tx.send(DashboardEvent::RunRequested(outcome));
                                }
                                Err(e) => {
                                    warn!(error = %e, "run request failed");
                                    let _ = event_tx.send(DashboardEvent::Info(
                                        InfoEvent::RunRequestFailed(e.to_string()),
                                    ));
                                }
                            }
                        });
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(done) = done_rx.recv() => {
                match pagination.apply(done.seq, done.result) {
                    Applied::Applied => publish(&event_tx, &pagination),
                    Applied::Stale => debug!(seq = done.seq, "discarding stale page response"),
                }
            }
            Some(status) = status_rx.recv() => {
                let _ = event_tx.send(DashboardEvent::Status(status));
                let finished = last_status == Some(RunnerStatus::Running)
                    && status == Some(RunnerStatus::Idle);
                // A pending prev/next away from page 0 wins over the refresh.
                if finished && pagination.target_index() == 0 {
                    info!("test run finished; refreshing first page");
                    let _ = event_tx.send(DashboardEvent::Info(InfoEvent::RunFinished));
                    spawn_fetch(&backend, pagination.load_first_page(), &done_tx);
                    publish(&event_tx, &pagination);
                }
                if status.is_some() {
                    last_status = status;
                }
            }
        }
    }

    if !poller.is_active() {
        warn!("status poller exited before shutdown");
    }
    poller.stop().await;
    info!("dashboard controller stopped");
    Ok(())
}
