//! Client-local pagination state.
//!
//! Pages are only reached by following backend cursors, never by index. Every
//! fetch is issued as a [`FetchTicket`] carrying a sequence number; a response
//! is applied only if it answers the most recently issued ticket, so a slow
//! earlier fetch can never overwrite newer state.

use crate::model::{Cursor, PageSize, ResultsPage};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    First(PageSize),
    Cursor(Cursor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub request: FetchRequest,
}

/// Snapshot handed to the render layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    /// Display-only counter; never sent to the backend.
    pub page_index: usize,
    pub rows_per_page: PageSize,
    pub page: Option<ResultsPage>,
    pub loading: bool,
    pub error: Option<String>,
}

impl PageView {
    pub fn can_prev(&self) -> bool {
        self.page.as_ref().is_some_and(ResultsPage::has_prev)
    }

    pub fn can_next(&self) -> bool {
        self.page.as_ref().is_some_and(ResultsPage::has_next)
    }

    /// 1-based row range shown, assuming full preceding pages.
    pub fn row_range(&self) -> Option<(u64, u64)> {
        let page = self.page.as_ref()?;
        if page.data.is_empty() {
            return None;
        }
        let start = self.page_index as u64 * u64::from(self.rows_per_page.get()) + 1;
        Some((start, start + page.data.len() as u64 - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    seq: u64,
    target_index: usize,
}

#[derive(Debug)]
pub struct PaginationState {
    view: PageView,
    last_seq: u64,
    pending: Option<Pending>,
}

impl PaginationState {
    pub fn new(rows_per_page: PageSize) -> Self {
        Self {
            view: PageView {
                page_index: 0,
                rows_per_page,
                page: None,
                loading: false,
                error: None,
            },
            last_seq: 0,
            pending: None,
        }
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn page_index(&self) -> usize {
        self.view.page_index
    }

    /// Index the view lands on once the pending fetch applies; the displayed
    /// index when nothing is in flight.
    pub fn target_index(&self) -> usize {
        self.pending
            .map(|p| p.target_index)
            .unwrap_or(self.view.page_index)
    }

    fn issue(&mut self, request: FetchRequest, target_index: usize) -> FetchTicket {
        self.last_seq += 1;
        self.pending = Some(Pending {
            seq: self.last_seq,
            target_index,
        });
        self.view.loading = true;
        FetchTicket {
            seq: self.last_seq,
            request,
        }
    }

    /// Fetch the newest page at the current size. The table keeps showing the
    /// old rows until the response lands.
    pub fn load_first_page(&mut self) -> FetchTicket {
        self.issue(FetchRequest::First(self.view.rows_per_page), 0)
    }

    /// Change the page size. Resets to page 0 and drops the current rows at once.
    /// Returns `None` when the size is unchanged.
    pub fn set_rows_per_page(&mut self, rows_per_page: PageSize) -> Option<FetchTicket> {
        if rows_per_page == self.view.rows_per_page {
            return None;
        }
        self.view.rows_per_page = rows_per_page;
        self.view.page_index = 0;
        self.view.page = None;
        self.view.error = None;
        Some(self.issue(FetchRequest::First(rows_per_page), 0))
    }

    /// Follow the displayed page's `next` cursor, if there is one.
    pub fn next_page(&mut self) -> Option<FetchTicket> {
        let page = self.view.page.as_ref()?;
        if !page.has_next() {
            return None;
        }
        let cursor = page.meta.next.clone();
        let target = self.view.page_index + 1;
        Some(self.issue(FetchRequest::Cursor(cursor), target))
    }

    /// Follow the displayed page's `prev` cursor, if there is one.
    pub fn prev_page(&mut self) -> Option<FetchTicket> {
        let page = self.view.page.as_ref()?;
        if !page.has_prev() {
            return None;
        }
        let cursor = page.meta.prev.clone();
        let target = self.view.page_index.saturating_sub(1);
        Some(self.issue(FetchRequest::Cursor(cursor), target))
    }

    /// Apply a fetch response. Anything but the latest ticket's answer is stale.
    pub fn apply<E: fmt::Display>(&mut self, seq: u64, result: Result<ResultsPage, E>) -> Applied {
        let pending = match self.pending {
            Some(p) if p.seq == seq => p,
            _ => return Applied::Stale,
        };
        self.pending = None;
        self.view.loading = false;

        match result {
            Ok(page) => {
                self.view.page = Some(page);
                self.view.page_index = pending.target_index;
                self.view.error = None;
            }
            Err(e) => {
                self.view.page = None;
                self.view.error = Some(e.to_string());
            }
        }
        Applied::Applied
    }
}
