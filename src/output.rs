//! CLI output formatting for the build report.
//!
//! # Information-First Display
//!
//! Each catalog entry leads with its position and label; the page it
//! produces is secondary context after `→`. Read top to bottom, the report
//! is the site's navigation order.
//!
//! ```text
//! Tags: global
//! Images: 6 indexed, 1 orphaned, 1 unusable
//! 001 Street (2 photos) → street-gallery.html
//! 002 Night (2 photos) → night-gallery.html
//! 003 All Photos (3 photos) → all-photos-gallery.html
//! 004 Travel (2 photos) → travel-gallery.html
//! Index → data/images.json
//! Landing → index.html
//! Generated 4 gallery pages from 6 images
//! ```
//!
//! Entries without images show `(no page)` instead of a target.
//!
//! # Architecture
//!
//! `format_*` functions return `Vec<String>` and do no I/O; `print_*`
//! wrappers write them to stdout.

use crate::index::IndexStats;
use crate::pipeline::{BuildReport, ReportEntry};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn photos(n: usize) -> String {
    if n == 1 {
        "1 photo".to_string()
    } else {
        format!("{n} photos")
    }
}

fn stats_line(stats: &IndexStats) -> String {
    let mut parts = vec![format!("{} indexed", stats.kept)];
    if stats.orphaned > 0 {
        parts.push(format!("{} orphaned", stats.orphaned));
    }
    if stats.duplicates > 0 {
        parts.push(format!("{} duplicate", stats.duplicates));
    }
    if stats.unusable > 0 {
        parts.push(format!("{} unusable", stats.unusable));
    }
    format!("Images: {}", parts.join(", "))
}

fn entry_line(position: usize, entry: &ReportEntry) -> String {
    let header = format!(
        "{} {} ({})",
        format_index(position),
        entry.label,
        photos(entry.images)
    );
    match &entry.page {
        Some(page) => format!("{header} \u{2192} {page}"),
        None => format!("{header} (no page)"),
    }
}

/// Format the report of a planned build.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![
        format!("Tags: {}", report.regime),
        stats_line(&report.stats),
    ];
    lines.extend(
        report
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| entry_line(i + 1, entry)),
    );
    lines.push(format!("Index \u{2192} {}", report.index_path.display()));
    lines.push(format!("Landing \u{2192} {}", report.landing_path.display()));
    lines.push(format!(
        "Generated {} gallery pages from {} images",
        report.pages(),
        report.stats.kept
    ));
    lines
}

/// Print the build report to stdout.
pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
