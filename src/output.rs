//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every entity (feed,
//! entry, chunk) leads with a positional index and its identity; URLs, paths
//! and sizes follow as indented context lines.
//!
//! # Output Format
//!
//! ## Fetch
//!
//! ```text
//! Feeds
//! 001 Sec Blog (2 entries)
//!     Source: https://sec.example/rss
//!     001 Yesterday post
//!     002 Another post
//!
//! Selected 2 entries from 1 of 4 feeds
//! ```
//!
//! ## Digest
//!
//! ```text
//! Digest 2026-10-19 (1 feed, 2 entries)
//!     today.md: ./today.md
//!     Archive: ./archive/2026/2026-10-19.md
//! ```
//!
//! ## Chunk plan
//!
//! ```text
//! 每日安全资讯（2026-10-19） → 2 chunks (budget 20480 bytes)
//! 001 20311 bytes, 41 groups
//!     First: Sec Blog
//! 002 812 bytes, 3 groups
//!     First: Yesterday post
//! ```
//!
//! ## Push
//!
//! ```text
//! feishu: 1/2 delivered
//!     001 20311 bytes sent
//!     002 812 bytes FAILED: server rejected payload with status 400: ...
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::chunker::Chunk;
use crate::digest::{Results, WrittenDigest};
use crate::dispatch::DispatchReport;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 entry`, `2 entries`
fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Format the feeds selected by a fetch run.
///
/// `sources` is the number of feed URLs that were attempted.
pub fn format_fetch_output(results: &Results, sources: usize) -> Vec<String> {
    let mut lines = vec!["Feeds".to_string()];
    for (i, feed) in results.feeds.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            feed.feed,
            plural(feed.entries.len(), "entry", "entries")
        ));
        lines.push(format!("{}Source: {}", indent(1), feed.url));
        for (j, entry) in feed.entries.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(1), format_index(j + 1), entry.title));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "Selected {} from {} of {}",
        plural(results.entry_count(), "entry", "entries"),
        results.feeds.len(),
        plural(sources, "feed", "feeds")
    ));
    lines
}

pub fn print_fetch_output(results: &Results, sources: usize) {
    print_lines(format_fetch_output(results, sources));
}

// ============================================================================
// Digest
// ============================================================================

pub fn format_digest_output(results: &Results, written: &WrittenDigest) -> Vec<String> {
    vec![
        format!(
            "Digest {} ({}, {})",
            results.date.format("%Y-%m-%d"),
            plural(results.feeds.len(), "feed", "feeds"),
            plural(results.entry_count(), "entry", "entries")
        ),
        format!("{}today.md: {}", indent(1), written.today.display()),
        format!("{}Archive: {}", indent(1), written.archive.display()),
    ]
}

pub fn print_digest_output(results: &Results, written: &WrittenDigest) {
    print_lines(format_digest_output(results, written));
}

// ============================================================================
// Chunk plan
// ============================================================================

/// Format how a document was split, without sending anything.
pub fn format_chunk_plan(title: &str, chunks: &[Chunk], budget: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{} → {} (budget {} bytes)",
        title,
        plural(chunks.len(), "chunk", "chunks"),
        budget
    )];
    for (i, chunk) in chunks.iter().enumerate() {
        let mut header = format!(
            "{} {} bytes, {}",
            format_index(i + 1),
            chunk.encoded_len,
            plural(chunk.groups.len(), "group", "groups")
        );
        if chunk.oversized {
            header.push_str(" [oversized]");
        }
        lines.push(header);
        if let Some(first) = chunk.nodes().next() {
            lines.push(format!("{}First: {}", indent(1), truncate(first.label(), 40)));
        }
    }
    lines
}

pub fn print_chunk_plan(title: &str, chunks: &[Chunk], budget: usize) {
    print_lines(format_chunk_plan(title, chunks, budget));
}

// ============================================================================
// Push
// ============================================================================

pub fn format_dispatch_report(report: &DispatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {}/{} delivered",
        report.transport,
        report.delivered(),
        report.outcomes.len()
    )];
    for outcome in &report.outcomes {
        let status = match &outcome.result {
            Ok(()) => "sent".to_string(),
            Err(e) => format!("FAILED: {}", truncate(&e.to_string(), 80)),
        };
        let flag = if outcome.oversized { " [oversized]" } else { "" };
        lines.push(format!(
            "{}{} {} bytes{} {}",
            indent(1),
            format_index(outcome.index + 1),
            outcome.bytes,
            flag,
            status
        ));
    }
    lines
}

pub fn print_dispatch_report(report: &DispatchReport) {
    print_lines(format_dispatch_report(report));
}
