use crate::model::ResultsPage;
use std::sync::OnceLock;
use time::{macros::format_description, OffsetDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Capture the local UTC offset. Must run before any other thread is spawned,
/// otherwise the platform refuses to report it and timestamps fall back to UTC.
pub fn init_local_offset() {
    let _ = LOCAL_OFFSET
        .get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC));
}

fn local_offset() -> UtcOffset {
    LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC)
}

pub fn round2(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

/// Convert bytes per second to megabits per second.
pub fn bytes_per_sec_to_mbps(value: f64) -> f64 {
    (value * 8.0) / 1_000_000.0
}

pub fn format_ping(ms: f64) -> f64 {
    round2(ms)
}

pub fn format_speed(bytes_per_sec: f64) -> f64 {
    round2(bytes_per_sec_to_mbps(bytes_per_sec))
}

pub fn format_timestamp(unix_secs: i64) -> String {
    format_timestamp_at(unix_secs, local_offset())
}

pub fn format_timestamp_at(unix_secs: i64, offset: UtcOffset) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(unix_secs)
        .ok()
        .and_then(|dt| dt.to_offset(offset).format(&format).ok())
        .unwrap_or_else(|| "-".to_string())
}

/// Compute metrics (mean, median, 25th percentile, 75th percentile) from samples
pub fn compute_metrics(samples: &[f64]) -> Option<(f64, f64, f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let median = sorted[n / 2];
    let p25 = sorted[n / 4];
    let p75 = sorted[3 * n / 4];
    Some((mean, median, p25, p75))
}

/// Mean and median of the rows on one page, in display units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSummary {
    pub ping_mean_ms: f64,
    pub ping_median_ms: f64,
    pub download_mean_mbps: f64,
    pub download_median_mbps: f64,
    pub upload_mean_mbps: f64,
    pub upload_median_mbps: f64,
}

pub fn summarize_page(page: &ResultsPage) -> Option<PageSummary> {
    let pings: Vec<f64> = page.data.iter().map(|r| r.ping).collect();
    let downs: Vec<f64> = page
        .data
        .iter()
        .map(|r| bytes_per_sec_to_mbps(r.download))
        .collect();
    let ups: Vec<f64> = page
        .data
        .iter()
        .map(|r| bytes_per_sec_to_mbps(r.upload))
        .collect();

    let (ping_mean_ms, ping_median_ms, _, _) = compute_metrics(&pings)?;
    let (download_mean_mbps, download_median_mbps, _, _) = compute_metrics(&downs)?;
    let (upload_mean_mbps, upload_median_mbps, _, _) = compute_metrics(&ups)?;

    Some(PageSummary {
        ping_mean_ms,
        ping_median_ms,
        download_mean_mbps,
        download_median_mbps,
        upload_mean_mbps,
        upload_median_mbps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageMeta, TestResult};

    #[test]
    fn ping_rounds_to_two_decimals() {
        assert_eq!(format_ping(12.345_67), 12.35);
        assert_eq!(format_ping(9.0), 9.0);
        assert_eq!(format_ping(1.005), 1.01);
    }

    #[test]
    fn speed_converts_bytes_to_megabits() {
        assert_eq!(format_speed(12_500_000.0), 100.0);
        assert_eq!(format_speed(1_234_567.0), 9.88);
        assert_eq!(format_speed(0.0), 0.0);
    }

    #[test]
    fn timestamp_formats_in_the_given_offset() {
        assert_eq!(
            format_timestamp_at(1_600_000_000, UtcOffset::UTC),
            "2020-09-13 12:26:40"
        );
        let plus_two = UtcOffset::from_hms(2, 0, 0).unwrap();
        assert_eq!(
            format_timestamp_at(1_600_000_000, plus_two),
            "2020-09-13 14:26:40"
        );
        assert_eq!(format_timestamp_at(i64::MAX, UtcOffset::UTC), "-");
    }

    #[test]
    fn metrics_on_small_samples() {
        assert!(compute_metrics(&[]).is_none());
        assert_eq!(compute_metrics(&[4.0]), Some((4.0, 4.0, 4.0, 4.0)));
        let (mean, median, p25, p75) = compute_metrics(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(mean, 2.5);
        assert_eq!(median, 3.0);
        assert_eq!(p25, 2.0);
        assert_eq!(p75, 4.0);
    }

    #[test]
    fn summarizes_a_page_in_display_units() {
        let row = |id, ping, download| TestResult {
            id,
            timestamp: 0,
            ping,
            download,
            upload: 1_250_000.0,
        };
        let page = ResultsPage {
            data: vec![row(1, 10.0, 12_500_000.0), row(2, 20.0, 25_000_000.0)],
            meta: PageMeta::default(),
        };
        let summary = summarize_page(&page).unwrap();
        assert_eq!(summary.ping_mean_ms, 15.0);
        assert_eq!(summary.download_mean_mbps, 150.0);
        assert_eq!(summary.upload_median_mbps, 10.0);

        assert!(summarize_page(&ResultsPage::default()).is_none());
    }
}
