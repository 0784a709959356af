//! CLI output formatting.
//!
//! Every printer is split into a pure `format_*` function returning lines
//! and a thin `print_*` wrapper, so the exact text is unit-testable.
//!
//! # Output Format
//!
//! ## Fetch progress
//!
//! ```text
//! Fetching details for 412 photos (380 cached, 32 to fetch)
//!     [ 1/32] 53412345678 Harbour at dusk
//!     [ 2/32] 53412345999 failed: HTTP 502 from https://api.flickr.com/services/rest/
//! Details: 380 cached, 31 fetched, 1 failed (412 total)
//! ```
//!
//! ## Ranking
//!
//! ```text
//! Date        Views  Faves   Rate  Title                      URL
//! ----------  -----  -----  -----  -------------------------  ---
//! 2023-04-01  12034     87   31.2  Harbour at dusk            https://www.flickr.com/photos/...
//! Selected 1 photos.
//! ```

use crate::fetch::{FetchEvent, FetchStats};
use crate::rank::{SECONDS_PER_DAY, view_rate};
use crate::types::PhotoDetail;
use chrono::DateTime;

pub const TITLE_WIDTH: usize = 40;
pub const TITLE_SUFFIX: usize = 8;
const ELLIPSIS: char = '\u{2026}';
const COLUMN_GAP: &str = "  ";

/// Shorten `title` to at most `total` characters, keeping its last
/// `suffix` characters after an ellipsis. A zero width yields "".
pub fn contract(title: &str, total: usize, suffix: usize) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= total {
        return title.to_string();
    }
    if total == 0 {
        return String::new();
    }
    let suffix = suffix.min(total.saturating_sub(1));
    let head = total.saturating_sub(suffix + 1);
    let mut out: String = chars[..head].iter().collect();
    out.push(ELLIPSIS);
    out.extend(&chars[chars.len() - suffix..]);
    out
}

fn posted_date(posted: i64) -> String {
    DateTime::from_timestamp(posted, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

// ============================================================================
// Fetch progress
// ============================================================================

pub fn format_found(count: usize) -> String {
    format!("Found {} photos.", count)
}

pub fn format_fetch_event(event: &FetchEvent) -> Vec<String> {
    match event {
        FetchEvent::Started {
            total,
            cached,
            to_fetch,
        } => vec![format!(
            "Fetching details for {} photos ({} cached, {} to fetch)",
            total, cached, to_fetch
        )],
        FetchEvent::Fetched {
            done,
            to_fetch,
            id,
            title,
        } => vec![format!(
            "    [{}] {} {}",
            progress(*done, *to_fetch),
            id,
            contract(title, TITLE_WIDTH, TITLE_SUFFIX)
        )],
        FetchEvent::Failed {
            done,
            to_fetch,
            id,
            error,
        } => vec![format!(
            "    [{}] {} failed: {}",
            progress(*done, *to_fetch),
            id,
            error
        )],
    }
}

fn progress(done: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("{:>width$}/{}", done, total, width = width)
}

pub fn format_fetch_summary(stats: &FetchStats) -> String {
    format!("Details: {}", stats)
}

// ============================================================================
// Ranking table
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

const COLUMNS: [(&str, Align); 6] = [
    ("Date", Align::Left),
    ("Views", Align::Right),
    ("Faves", Align::Right),
    ("Rate", Align::Right),
    ("Title", Align::Left),
    ("URL", Align::Left),
];

/// Ranking table followed by the selection count. Rate is views per day.
pub fn format_ranking(photos: &[PhotoDetail], now: i64) -> Vec<String> {
    let rows: Vec<[String; 6]> = photos
        .iter()
        .map(|p| {
            [
                posted_date(p.posted),
                p.views.to_string(),
                p.favorites.to_string(),
                format!("{:.1}", view_rate(p, now) * SECONDS_PER_DAY as f64),
                contract(&p.title, TITLE_WIDTH, TITLE_SUFFIX),
                p.url.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(|(name, _)| name.chars().count().max(5));
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 3);
    let header = COLUMNS.map(|(name, _)| name.to_string());
    lines.push(table_line(header, &widths));
    lines.push(table_line(widths.map(|w| "-".repeat(w)), &widths));
    for row in rows {
        lines.push(table_line(row, &widths));
    }
    lines.push(format!("Selected {} photos.", photos.len()));
    lines
}

fn table_line(cells: [String; 6], widths: &[usize; 6]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .zip(COLUMNS)
        .map(|((cell, &width), (_, align))| match align {
            Align::Left => format!("{:<width$}", cell, width = width),
            Align::Right => format!("{:>width$}", cell, width = width),
        })
        .collect();
    padded.join(COLUMN_GAP).trim_end().to_string()
}

pub fn print_ranking(photos: &[PhotoDetail], now: i64) {
    println!();
    for line in format_ranking(photos, now) {
        println!("{}", line);
    }
}
