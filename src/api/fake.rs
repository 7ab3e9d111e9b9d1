//! Scripted in-memory backend for deterministic tests.

use super::{ApiError, Backend, Result};
use crate::model::{Cursor, PageMeta, ResultsPage, RunOutcome, RunnerStatus, TestResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

/// Backend that serves `total` results newest-first with offset cursors.
#[derive(Debug)]
pub(crate) struct ScriptedBackend {
    state: Mutex<ScriptState>,
}

#[derive(Debug, Default)]
struct ScriptState {
    total: u64,
    running: bool,
    statuses: VecDeque<Result<RunnerStatus>>,
    limit_delays: HashMap<u32, Duration>,
    cursor_delay: Option<Duration>,
    fail_listing: bool,
    calls: Vec<String>,
}

impl ScriptedBackend {
    pub fn new(total: u64) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                total,
                ..Default::default()
            }),
        }
    }

    /// Delay first-page responses requested with this limit.
    pub fn delay_limit(self, limit: u32, delay: Duration) -> Self {
        self.state.lock().unwrap().limit_delays.insert(limit, delay);
        self
    }

    /// Delay every cursor-addressed page.
    pub fn delay_cursor(self, delay: Duration) -> Self {
        self.state.lock().unwrap().cursor_delay = Some(delay);
        self
    }

    pub fn running(self, running: bool) -> Self {
        self.state.lock().unwrap().running = running;
        self
    }

    pub fn failing_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    /// Status polls pop these first; afterwards they report the run flag.
    pub fn script_statuses(self, statuses: Vec<Result<RunnerStatus>>) -> Self {
        self.state.lock().unwrap().statuses = statuses.into();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn listing(&self, offset: u64, limit: u64) -> Result<ResultsPage> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(ApiError::Protocol("scripted listing failure".into()));
        }
        let total = state.total;
        let end = (offset + limit).min(total);
        let data = (offset..end)
            .map(|i| {
                let id = (total - i) as i64;
                TestResult {
                    id,
                    timestamp: 1_600_000_000 + id,
                    ping: 10.0 + id as f64,
                    download: 12_500_000.0,
                    upload: 2_500_000.0,
                }
            })
            .collect();
        let prev = if offset > 0 {
            Cursor::new(format!(
                "/api/results?offset={}&limit={limit}",
                offset.saturating_sub(limit)
            ))
        } else {
            Cursor::default()
        };
        let next = if end < total {
            Cursor::new(format!("/api/results?offset={end}&limit={limit}"))
        } else {
            Cursor::default()
        };
        Ok(ResultsPage {
            data,
            meta: PageMeta {
                count: total,
                prev,
                next,
            },
        })
    }
}

fn cursor_param(cursor: &Cursor, key: &str) -> Option<u64> {
    let (_, query) = cursor.as_str().split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse().ok())
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn fetch_first_page(&self, limit: NonZeroU32) -> Result<ResultsPage> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("first:{limit}"));
            state.limit_delays.get(&limit.get()).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.listing(0, u64::from(limit.get()))
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<ResultsPage> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("cursor:{}", cursor.as_str()));
            state.cursor_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let offset = cursor_param(cursor, "offset").unwrap_or(0);
        let limit = cursor_param(cursor, "limit").unwrap_or(3);
        self.listing(offset, limit)
    }

    async fn run_test(&self) -> Result<RunOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("run".into());
        if state.running {
            Ok(RunOutcome::Rejected)
        } else {
            state.running = true;
            Ok(RunOutcome::Accepted)
        }
    }

    async fn poll_status(&self) -> Result<RunnerStatus> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("status".into());
        match state.statuses.pop_front() {
            Some(scripted) => scripted,
            None if state.running => Ok(RunnerStatus::Running),
            None => Ok(RunnerStatus::Idle),
        }
    }
}
