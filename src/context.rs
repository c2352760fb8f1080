//! Per-run date and file locations.
//!
//! A [`RunContext`] is built once when a command starts and passed by
//! reference to every stage that needs the run date or an output path.

use crate::config::DigestConfig;
use chrono::{Days, Local, NaiveDate};
use std::path::{Path, PathBuf};

pub const TODAY_FILE: &str = "today.md";
pub const RESULTS_FILE: &str = "temp_data.json";
pub const LISTS_DIR: &str = "rss";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Date the digest is published for.
    pub today: NaiveDate,
    /// Directory holding every generated file.
    pub root: PathBuf,
    /// Archive directory, relative to `root`.
    pub archive_dir: PathBuf,
}

impl RunContext {
    pub fn new(today: NaiveDate, root: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            today,
            root: root.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Context for `today` (local clock when `None`) using the configured paths.
    pub fn from_config(config: &DigestConfig, today: Option<NaiveDate>) -> Self {
        Self::new(
            today.unwrap_or_else(|| Local::now().date_naive()),
            &config.output_dir,
            &config.archive_dir,
        )
    }

    /// The day whose entries go into today's digest.
    pub fn yesterday(&self) -> NaiveDate {
        self.today
            .checked_sub_days(Days::new(1))
            .unwrap_or(self.today)
    }

    /// `YYYY-MM-DD`
    pub fn date_label(&self) -> String {
        self.today.format("%Y-%m-%d").to_string()
    }

    pub fn today_path(&self) -> PathBuf {
        self.root.join(TODAY_FILE)
    }

    /// `<root>/<archive_dir>/<YYYY>/<YYYY-MM-DD>.md`
    pub fn archive_path(&self) -> PathBuf {
        self.root
            .join(&self.archive_dir)
            .join(self.today.format("%Y").to_string())
            .join(format!("{}.md", self.date_label()))
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// Local copy of a subscription list.
    pub fn list_path(&self, file: &str) -> PathBuf {
        self.root.join(LISTS_DIR).join(file)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RunContext {
        RunContext::new(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            "/data",
            "archive",
        )
    }

    #[test]
    fn yesterday_crosses_year_boundary() {
        assert_eq!(
            ctx().yesterday(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn paths_are_rooted() {
        let ctx = ctx();
        assert_eq!(ctx.today_path(), PathBuf::from("/data/today.md"));
        assert_eq!(ctx.results_path(), PathBuf::from("/data/temp_data.json"));
        assert_eq!(ctx.list_path("a.opml"), PathBuf::from("/data/rss/a.opml"));
    }

    #[test]
    fn archive_path_is_dated() {
        assert_eq!(
            ctx().archive_path(),
            PathBuf::from("/data/archive/2026/2026-01-01.md")
        );
    }

    #[test]
    fn from_config_uses_explicit_date() {
        let config = DigestConfig::default();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let ctx = RunContext::from_config(&config, Some(date));
        assert_eq!(ctx.today, date);
        assert_eq!(ctx.date_label(), "2026-10-19");
        assert_eq!(ctx.root(), Path::new("."));
    }
}
