use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::notice::Notice;
use crate::pagination::PageView;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub rows_per_page: PageSize,
    pub poll_interval: Duration,
    pub notice_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// Number of rows requested per page. Only the sizes in [`PageSize::ALLOWED`] exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(u32);

impl PageSize {
    pub const ALLOWED: [u32; 4] = [10, 25, 50, 100];

    pub fn new(rows: u32) -> Option<Self> {
        Self::ALLOWED.contains(&rows).then_some(Self(rows))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn limit(self) -> NonZeroU32 {
        NonZeroU32::new(self.0).unwrap_or(NonZeroU32::MIN)
    }

    /// Next allowed size, wrapping back to the smallest.
    pub fn cycle(self) -> Self {
        let idx = Self::ALLOWED
            .iter()
            .position(|&n| n == self.0)
            .unwrap_or(0);
        Self(Self::ALLOWED[(idx + 1) % Self::ALLOWED.len()])
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(25)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not a number"))?;
        PageSize::new(rows).ok_or_else(|| {
            format!(
                "rows per page must be one of {:?}, got {rows}",
                PageSize::ALLOWED
            )
        })
    }
}

/// Opaque page token issued by the backend. Never parsed; only replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    /// Seconds since the unix epoch.
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: i64,
    /// Latency in milliseconds.
    pub ping: f64,
    /// Bytes per second.
    pub download: f64,
    /// Bytes per second.
    pub upload: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub count: u64,
    #[serde(default, deserialize_with = "de_cursor")]
    pub prev: Cursor,
    #[serde(default, deserialize_with = "de_cursor")]
    pub next: Cursor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsPage {
    #[serde(alias = "results")]
    pub data: Vec<TestResult>,
    pub meta: PageMeta,
}

impl ResultsPage {
    pub fn has_prev(&self) -> bool {
        !self.meta.prev.is_empty()
    }

    pub fn has_next(&self) -> bool {
        !self.meta.next.is_empty()
    }
}

fn de_cursor<'de, D>(deserializer: D) -> Result<Cursor, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(Cursor)
        .unwrap_or_default())
}

/// Accepts unix seconds or an RFC 3339 string (older backends store text timestamps).
fn de_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(secs) => Ok(secs),
        Raw::Float(secs) => Ok(secs.trunc() as i64),
        Raw::Text(text) => {
            if let Ok(secs) = text.trim().parse::<i64>() {
                return Ok(secs);
            }
            time::OffsetDateTime::parse(text.trim(), &time::format_description::well_known::Rfc3339)
                .map(|dt| dt.unix_timestamp())
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {text:?}: {e}")))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerStatus {
    #[serde(alias = "idle", alias = "IDLE")]
    Idle,
    #[serde(alias = "running", alias = "RUNNING")]
    Running,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerStatus::Idle => f.write_str("Idle"),
            RunnerStatus::Running => f.write_str("Running"),
        }
    }
}

/// What the backend said about a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Accepted,
    /// A test is already in progress.
    Rejected,
    /// Neither success nor conflict; the caller must not assume either.
    Indeterminate { status: u16 },
}

impl RunOutcome {
    pub fn to_message(self) -> String {
        match self {
            RunOutcome::Accepted => "Test run started".to_string(),
            RunOutcome::Rejected => "A test is already running.".to_string(),
            RunOutcome::Indeterminate { status } => {
                format!("Run request returned HTTP {status}; state unknown")
            }
        }
    }
}

/// Events emitted by the orchestrator and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Pagination(PageView),
    /// `None` when the last poll failed.
    Status(Option<RunnerStatus>),
    RunRequested(RunOutcome),
    Notice(Notice),
    Info(InfoEvent),
}

#[derive(Debug, Clone)]
pub enum InfoEvent {
    NoNextPage,
    NoPrevPage,
    RunRequestFailed(String),
    RunFinished,
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::NoNextPage => "Already on the last page".to_string(),
            InfoEvent::NoPrevPage => "Already on the first page".to_string(),
            InfoEvent::RunRequestFailed(err) => format!("Run request failed: {err}"),
            InfoEvent::RunFinished => "Test run finished; refreshing".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_rejects_sizes_outside_the_allowed_set() {
        assert_eq!("25".parse::<PageSize>().unwrap().get(), 25);
        assert!("0".parse::<PageSize>().is_err());
        assert!("30".parse::<PageSize>().is_err());
        assert!("ten".parse::<PageSize>().is_err());
    }

    #[test]
    fn page_size_cycles_through_all_sizes() {
        let mut size = PageSize::new(10).unwrap();
        let mut seen = vec![size.get()];
        for _ in 0..4 {
            size = size.cycle();
            seen.push(size.get());
        }
        assert_eq!(seen, vec![10, 25, 50, 100, 10]);
    }

    #[test]
    fn decodes_results_page() {
        let body = r#"{
            "data": [
                {"id": 7, "timestamp": 1600000000, "ping": 12.345, "download": 12500000, "upload": 2500000.5}
            ],
            "meta": {"count": 50, "prev": "", "next": "/api/results?cursor=xyz"}
        }"#;
        let page: ResultsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, 7);
        assert_eq!(page.data[0].timestamp, 1_600_000_000);
        assert_eq!(page.meta.count, 50);
        assert!(!page.has_prev());
        assert!(page.has_next());
        assert_eq!(page.meta.next.as_str(), "/api/results?cursor=xyz");
    }

    #[test]
    fn decodes_legacy_payload_with_null_cursors_and_text_timestamps() {
        let body = r#"{
            "results": [
                {"id": 1, "timestamp": "2020-09-13T12:26:40Z", "ping": 9.5, "download": 100, "upload": 50}
            ],
            "meta": {"count": 1, "prev": null}
        }"#;
        let page: ResultsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.data[0].timestamp, 1_600_000_000);
        assert!(page.meta.prev.is_empty());
        assert!(page.meta.next.is_empty());
    }

    #[test]
    fn rejects_page_missing_required_fields() {
        let body = r#"{"data": [{"id": 1, "timestamp": 1, "ping": 1.0}], "meta": {"count": 1}}"#;
        assert!(serde_json::from_str::<ResultsPage>(body).is_err());
        assert!(serde_json::from_str::<ResultsPage>(r#"{"data": []}"#).is_err());
    }

    #[test]
    fn decodes_runner_status_strings() {
        assert_eq!(
            serde_json::from_str::<RunnerStatus>(r#""Running""#).unwrap(),
            RunnerStatus::Running
        );
        assert_eq!(
            serde_json::from_str::<RunnerStatus>(r#""idle""#).unwrap(),
            RunnerStatus::Idle
        );
        assert!(serde_json::from_str::<RunnerStatus>(r#""Paused""#).is_err());
    }
}
