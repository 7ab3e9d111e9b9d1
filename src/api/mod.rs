//! Access to the results backend.
//!
//! [`Backend`] is the seam between the dashboard and the HTTP surface; the
//! orchestrator only talks to a `dyn Backend` so tests can script responses.

mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpBackend;

use crate::model::{Cursor, ResultsPage, RunOutcome, RunnerStatus};
use async_trait::async_trait;
use std::num::NonZeroU32;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure: timeout, refused connection, DNS.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response arrived but was not what the protocol promises.
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Most recent page, at most `limit` rows.
    async fn fetch_first_page(&self, limit: NonZeroU32) -> Result<ResultsPage>;

    /// Page addressed by a cursor; an empty cursor asks for the backend's default page.
    async fn fetch_page(&self, cursor: &Cursor) -> Result<ResultsPage>;

    async fn run_test(&self) -> Result<RunOutcome>;

    async fn poll_status(&self) -> Result<RunnerStatus>;
}
