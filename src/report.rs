use std::fmt::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    core::types::{BlockRange, ScanResult, ScanStatus},
    utils::format::{display_extra_data, format_percentage},
};

const HEADERS: [&str; 4] = ["Hex", "Decoded", "Count", "Percentage"];

/// Everything the binary prints about one scan
#[derive(Serialize, Debug, Clone)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub rpc_url: String,
    pub range: BlockRange,
    pub workers: usize,
    pub elapsed_ms: u64,
    pub status: ScanStatus,
    pub result: ScanResult,
}

impl ScanReport {
    pub fn new(
        rpc_url: impl Into<String>,
        range: BlockRange,
        workers: usize,
        elapsed: Duration,
        status: ScanStatus,
        result: ScanResult,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            rpc_url: rpc_url.into(),
            range,
            workers,
            elapsed_ms: elapsed.as_millis() as u64,
            status,
            result,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One table row per distinct value, most frequent first.
/// Percentages are relative to the number of requested blocks.
pub fn render_table(result: &ScanResult) -> String {
    let rows: Vec<[String; 4]> = result
        .histogram
        .sorted_by_count()
        .into_iter()
        .map(|(key, count)| {
            [
                key.to_string(),
                sanitize(&display_extra_data(key)),
                count.to_string(),
                format_percentage(count, result.total_requested),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header = HEADERS.map(str::to_string);
    push_row(&mut out, &header, &widths);
    push_separator(&mut out, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let _ = writeln!(
        out,
        "│ {:<w0$} │ {:<w1$} │ {:>w2$} │ {:>w3$} │",
        cells[0],
        cells[1],
        cells[2],
        cells[3],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
}

fn push_separator(out: &mut String, widths: &[usize; 4]) {
    let parts: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    let _ = writeln!(out, "├{}┤", parts.join("┼"));
}

/// Control characters from arbitrary extra-data would break the table layout
fn sanitize(decoded: &str) -> String {
    decoded
        .chars()
        .map(|c| if c.is_control() { '.' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ERROR_KEY, Histogram};
    use crate::utils::format::encode_extra_data;

    fn sample_result() -> ScanResult {
        let histogram: Histogram = [
            (encode_extra_data(b"geth"), 3u64),
            (ERROR_KEY.to_string(), 1),
            (encode_extra_data(b"nethermind"), 4),
        ]
        .into_iter()
        .collect();
        ScanResult {
            total_requested: 8,
            total_processed: 8,
            histogram,
        }
    }

    #[test]
    fn table_sorted_by_count_with_percentages() {
        let table = render_table(&sample_result());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("Hex") && lines[0].contains("Percentage"));
        assert!(lines[2].contains("nethermind") && lines[2].contains("50.00%"));
        assert!(lines[3].contains("geth") && lines[3].contains("37.50%"));
        assert!(lines[4].contains(ERROR_KEY) && lines[4].contains("(decode error)"));
        assert!(lines[4].contains("12.50%"));
    }

    #[test]
    fn table_rows_share_width() {
        let table = render_table(&sample_result());
        let widths: Vec<usize> = table.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{table}");
    }

    #[test]
    fn control_characters_are_masked() {
        assert_eq!(sanitize("a\nb\u{0}"), "a.b.");
    }

    #[test]
    fn report_serializes_histogram_as_map() -> Result<()> {
        let range = BlockRange::new(100, 107)?;
        let report = ScanReport::new(
            "http://localhost:8545",
            range,
            4,
            Duration::from_millis(1500),
            ScanStatus::Completed,
            sample_result(),
        );

        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        assert_eq!(json["status"], "Completed");
        assert_eq!(json["elapsed_ms"], 1500);
        assert_eq!(json["range"]["start"], 100);
        assert_eq!(json["result"]["total_processed"], 8);
        assert_eq!(json["result"]["histogram"][ERROR_KEY], 1);
        Ok(())
    }
}
