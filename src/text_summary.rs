//! Text rendering of a results page for CLI output.

use crate::metrics;
use crate::model::ResultsPage;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a fixed-width table of the page rows followed by paging hints and averages.
pub(crate) fn build_text_summary(page: &ResultsPage) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "{:<19}  {:>9}  {:>15}  {:>13}",
        "Timestamp", "Ping (ms)", "Download (Mbps)", "Upload (Mbps)"
    ));
    for r in &page.data {
        lines.push(format!(
            "{:<19}  {:>9.2}  {:>15.2}  {:>13.2}",
            metrics::format_timestamp(r.timestamp),
            metrics::format_ping(r.ping),
            metrics::format_speed(r.download),
            metrics::format_speed(r.upload)
        ));
    }
    if page.data.is_empty() {
        lines.push("(no results)".to_string());
    }

    lines.push(String::new());
    lines.push(format!(
        "Showing {} of {} results",
        page.data.len(),
        page.meta.count
    ));
    if page.has_prev() {
        lines.push(format!("Prev: {}", page.meta.prev.as_str()));
    }
    if page.has_next() {
        lines.push(format!("Next: {}", page.meta.next.as_str()));
    }

    if let Some(s) = metrics::summarize_page(page) {
        lines.push(format!(
            "Page avg: ping {:.2} ms (med {:.2}), down {:.2} Mbps (med {:.2}), up {:.2} Mbps (med {:.2})",
            s.ping_mean_ms,
            s.ping_median_ms,
            s.download_mean_mbps,
            s.download_median_mbps,
            s.upload_mean_mbps,
            s.upload_median_mbps
        ));
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cursor, PageMeta, TestResult};

    #[test]
    fn lists_rows_and_paging_hints() {
        let page = ResultsPage {
            data: vec![TestResult {
                id: 1,
                timestamp: 1_600_000_000,
                ping: 12.345,
                download: 12_500_000.0,
                upload: 2_500_000.0,
            }],
            meta: PageMeta {
                count: 50,
                prev: Cursor::default(),
                next: Cursor::new("/api/results?cursor=xyz"),
            },
        };
        let summary = build_text_summary(&page);

        assert!(summary.lines[0].starts_with("Timestamp"));
        let row = &summary.lines[1];
        assert!(row.contains("12.35"), "{row}");
        assert!(row.contains("100.00"), "{row}");
        assert!(row.contains("20.00"), "{row}");
        assert!(summary.lines.iter().any(|l| l == "Showing 1 of 50 results"));
        assert!(summary.lines.iter().any(|l| l == "Next: /api/results?cursor=xyz"));
        assert!(!summary.lines.iter().any(|l| l.starts_with("Prev:")));
    }

    #[test]
    fn empty_page_says_so() {
        let summary = build_text_summary(&ResultsPage::default());
        assert!(summary.lines.iter().any(|l| l == "(no results)"));
        assert!(!summary.lines.iter().any(|l| l.starts_with("Page avg")));
    }
}
