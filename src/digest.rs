//! Markdown digest assembly and the files written for each run.
//!
//! The fetch stage stores its selection in `temp_data.json` ([`Results`]);
//! the digest stage renders it to markdown and writes the same text to
//! `today.md` and the dated archive copy:
//!
//! ```text
//! # 每日安全资讯（2026-10-19）
//!
//! - Feed title
//!   - [Entry title](https://example.com/post)
//! ```
//!
//! This is the markdown subset [`crate::markdown::parse`] reads back before
//! pushing.

use crate::context::RunContext;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DigestError + '_ {
    move |source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One selected entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub title: String,
    pub link: String,
}

/// Selected entries of one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDigest {
    /// Feed title as published by the feed.
    pub feed: String,
    /// URL the feed was fetched from.
    pub url: String,
    pub entries: Vec<DigestEntry>,
}

impl FeedDigest {
    /// Build a digest, keeping the first entry for each distinct title.
    pub fn new(
        feed: impl Into<String>,
        url: impl Into<String>,
        entries: impl IntoIterator<Item = DigestEntry>,
    ) -> Self {
        let mut kept: Vec<DigestEntry> = Vec::new();
        for entry in entries {
            if !kept.iter().any(|k| k.title == entry.title) {
                kept.push(entry);
            }
        }
        Self {
            feed: feed.into(),
            url: url.into(),
            entries: kept,
        }
    }
}

/// Everything one fetch run selected, as stored in `temp_data.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    pub date: NaiveDate,
    pub feeds: Vec<FeedDigest>,
}

impl Results {
    pub fn entry_count(&self) -> usize {
        self.feeds.iter().map(|f| f.entries.len()).sum()
    }
}

/// Digest heading: `<prefix>（YYYY-MM-DD）`.
pub fn digest_title(prefix: &str, ctx: &RunContext) -> String {
    format!("{prefix}（{}）", ctx.date_label())
}

/// Render the digest markdown.
pub fn render_markdown(title: &str, feeds: &[FeedDigest]) -> String {
    let mut md = format!("# {title}\n\n");
    for feed in feeds {
        md.push_str(&format!("- {}\n", feed.feed));
        for entry in &feed.entries {
            md.push_str(&format!("  - [{}]({})\n", entry.title, entry.link));
        }
    }
    md
}

/// Paths written by [`write_digest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDigest {
    pub today: PathBuf,
    pub archive: PathBuf,
}

/// Write `markdown` to `today.md` and the dated archive file.
pub fn write_digest(ctx: &RunContext, markdown: &str) -> Result<WrittenDigest, DigestError> {
    let today = ctx.today_path();
    let archive = ctx.archive_path();
    for path in [&today, &archive] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(path, markdown).map_err(io_error(path))?;
    }
    Ok(WrittenDigest { today, archive })
}

pub fn write_results(ctx: &RunContext, results: &Results) -> Result<PathBuf, DigestError> {
    let path = ctx.results_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let json = serde_json::to_string_pretty(results)?;
    fs::write(&path, json).map_err(io_error(&path))?;
    Ok(path)
}

pub fn read_results(ctx: &RunContext) -> Result<Results, DigestError> {
    let path = ctx.results_path();
    let json = fs::read_to_string(&path).map_err(io_error(&path))?;
    Ok(serde_json::from_str(&json)?)
}
