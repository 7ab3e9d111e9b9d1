use crate::model::{DashboardEvent, PageSize, RunOutcome, RunnerStatus};
use crate::notice::NoticeBoard;
use crate::pagination::PageView;

pub const TAB_RESULTS: usize = 0;
pub const TAB_HELP: usize = 1;
pub const TAB_COUNT: usize = 2;

/// Everything the render loop draws. Owned by the UI thread only.
#[derive(Debug, Default)]
pub struct UiState {
    pub tab: usize,
    pub base_url: String,
    /// Size requested most recently. Only the UI changes it, so snapshots never
    /// overwrite it.
    pub rows_per_page: PageSize,
    /// Latest pagination snapshot; `None` until the controller publishes one.
    pub view: Option<PageView>,
    /// `None` while unknown: no poll yet, or the last poll failed.
    pub status: Option<RunnerStatus>,
    pub status_polled: bool,
    pub notices: NoticeBoard,
    pub info: String,
}

impl UiState {
    pub fn new(base_url: impl Into<String>, rows_per_page: PageSize) -> Self {
        Self {
            base_url: base_url.into(),
            rows_per_page,
            info: "Loading results…".into(),
            ..Default::default()
        }
    }

    pub fn status_label(&self) -> &'static str {
        match (self.status, self.status_polled) {
            (Some(RunnerStatus::Running), _) => "Running",
            (Some(RunnerStatus::Idle), _) => "Idle",
            (None, false) => "Checking…",
            (None, true) => "Unknown",
        }
    }

    pub fn next_tab(&mut self) {
        self.tab = (self.tab + 1) % TAB_COUNT;
    }

    pub fn apply_event(&mut self, ev: DashboardEvent) {
        match ev {
            DashboardEvent::Pagination(view) => {
                if !view.loading && view.error.is_none() && self.info == "Loading results…" {
                    self.info.clear();
                }
                self.view = Some(view);
            }
            DashboardEvent::Status(status) => {
                self.status = status;
                self.status_polled = true;
            }
            DashboardEvent::RunRequested(outcome) => {
                // Rejections surface through their notice.
                if outcome != RunOutcome::Rejected {
                    self.info = outcome.to_message();
                }
            }
            DashboardEvent::Notice(notice) => self.notices.push(notice),
            DashboardEvent::Info(info) => self.info = info.to_message(),
        }
    }
}
