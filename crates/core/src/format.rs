//! Display formatting helpers.
//!
//! These are deliberately deterministic: the record detail view and the
//! deletion confirmation both embed their output verbatim, and the workflow
//! tests assert against the exact strings.

use chrono::NaiveDate;

/// Formats a byte count as a human-readable size with one decimal place.
///
/// Uses binary multiples, so `1536` renders as `1.5 KB`. Values below one
/// kilobyte render without a decimal, e.g. `128 bytes`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Formats a date the way the portal presents dates of birth, e.g.
/// `01 January 1970`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

/// Formats a file count phrase, e.g. `1 file` or `12 files`.
pub fn file_count_phrase(count: u64) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", count)
    }
}
