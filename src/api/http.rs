use super::{ApiError, Backend, Result};
use crate::model::{ClientConfig, Cursor, ResultsPage, RunOutcome, RunnerStatus};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::num::NonZeroU32;
use tracing::{debug, info};

pub const RESULTS_PATH: &str = "/api/results";
pub const RUN_TEST_PATH: &str = "/api/run_test";
pub const STATUS_PATH: &str = "/api/status";

/// Longest response body excerpt carried in protocol errors.
const BODY_SNIPPET_CHARS: usize = 200;

/// reqwest-backed client for the results backend.
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(cfg: &ClientConfig) -> anyhow::Result<Self> {
        let mut raw = cfg.base_url.trim().to_string();
        // Endpoints are joined relative to the base so a path prefix survives.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).with_context(|| format!("invalid base URL {raw:?}"))?;

        let http = reqwest::Client::builder()
            .user_agent(&cfg.user_agent)
            .timeout(cfg.request_timeout)
            .build()
            .context("build http client")?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Protocol(format!("invalid endpoint {path}: {e}")))
    }

    /// Cursors are replayed verbatim: a full URL is used as-is, a path is resolved
    /// against the backend origin.
    fn cursor_url(&self, cursor: &Cursor) -> Result<Url> {
        if cursor.is_empty() {
            return self.endpoint(RESULTS_PATH);
        }
        self.base_url.join(cursor.as_str()).map_err(|e| {
            ApiError::Protocol(format!(
                "backend issued an unusable cursor {:?}: {e}",
                cursor.as_str()
            ))
        })
    }

    async fn get_page(&self, url: Url) -> Result<ResultsPage> {
        debug!(%url, "fetching results page");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::Protocol(format!(
                "results request failed with {status}: {}",
                body_snippet(&body)
            )));
        }

        let page: ResultsPage = serde_json::from_slice(&body)
            .map_err(|e| ApiError::Protocol(format!("invalid results page: {e}")))?;
        debug!(
            rows = page.data.len(),
            count = page.meta.count,
            "results page received"
        );
        Ok(page)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_first_page(&self, limit: NonZeroU32) -> Result<ResultsPage> {
        let mut url = self.endpoint(RESULTS_PATH)?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        self.get_page(url).await
    }

    async fn fetch_page(&self, cursor: &Cursor) -> Result<ResultsPage> {
        let url = self.cursor_url(cursor)?;
        self.get_page(url).await
    }

    async fn run_test(&self) -> Result<RunOutcome> {
        let url = self.endpoint(RUN_TEST_PATH)?;
        let resp = self.http.post(url).send().await?;
        let status = resp.status();

        let outcome = if status.is_success() {
            RunOutcome::Accepted
        } else if status == StatusCode::CONFLICT {
            RunOutcome::Rejected
        } else {
            RunOutcome::Indeterminate {
                status: status.as_u16(),
            }
        };
        info!(%status, ?outcome, "run request answered");
        Ok(outcome)
    }

    async fn poll_status(&self) -> Result<RunnerStatus> {
        let url = self.endpoint(STATUS_PATH)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::Protocol(format!(
                "status request failed with {status}: {}",
                body_snippet(&body)
            )));
        }
        parse_status(&body)
    }
}

/// Accepts a JSON string (`"Running"`) or the bare word some backends send as text.
fn parse_status(body: &[u8]) -> Result<RunnerStatus> {
    serde_json::from_slice::<RunnerStatus>(body)
        .or_else(|_| {
            let text = String::from_utf8_lossy(body);
            serde_json::from_value(serde_json::Value::String(text.trim().to_string()))
        })
        .map_err(|e| {
            ApiError::Protocol(format!(
                "invalid runner status {:?}: {e}",
                body_snippet(body)
            ))
        })
}

fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > BODY_SNIPPET_CHARS {
        format!(
            "{}…",
            text.chars().take(BODY_SNIPPET_CHARS).collect::<String>()
        )
    } else {
        text.to_string()
    }
}
