//! Run configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The user file is
//! sparse: it is merged table-by-table on top of the stock defaults, so it
//! only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [digest]
//! title_prefix = "每日安全资讯"    # Heading of the generated digest
//! fallback_title = "每日安全资讯"  # Title used when a digest has no heading
//! output_dir = "."                 # Where today.md, temp_data.json, rss/ live
//! archive_dir = "archive"          # Dated copies: <archive_dir>/<YYYY>/<date>.md
//!
//! [fetch]
//! timeout_secs = 10
//! user_agent = "Mozilla/5.0"
//! accept_language = "zh-CN,zh;q=0.9"
//! # max_workers = 32               # Parallel fetches (default 32)
//!
//! [filter]
//! exclude = []                     # Drop entries whose title contains any of these
//!
//! [sources]
//! feeds = []                       # Feed URLs fetched directly
//!
//! [[sources.lists]]                # OPML subscription lists
//! name = "CyberSecurityRSS"
//! url = "https://example.com/list.opml"  # Refreshed with --update
//! file = "CyberSecurityRSS.opml"   # Local copy under <output_dir>/rss/
//! enabled = true
//!
//! [push]
//! budget = 20480                   # Max bytes per message
//!
//! [bots.feishu]
//! enabled = false
//! secret_env = "FEISHU_HOOK"       # Env var holding the webhook URL
//! # key = "https://open.feishu.cn/open-apis/bot/v2/hook/..."
//!
//! [bots.telegram]
//! enabled = false
//! secret_env = "TELEGRAM_TOKEN"    # Env var holding the bot token
//! chat_id = "-1001234567890"       # Chat the bot posts to
//! ```
//!
//! Unknown keys are rejected to catch typos early, and every `[bots.<name>]`
//! must name a transport known to [`crate::transport::TransportKind`].

use crate::transport::TransportKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Run configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YarbConfig {
    /// Digest titles and output locations.
    pub digest: DigestConfig,
    /// HTTP settings for feed retrieval.
    pub fetch: FetchConfig,
    /// Entry filtering.
    pub filter: FilterConfig,
    /// Where feed URLs come from.
    pub sources: SourcesConfig,
    /// Message size limits.
    pub push: PushConfig,
    /// Bots keyed by registry name.
    pub bots: BTreeMap<String, BotConfig>,
}

impl Default for YarbConfig {
    fn default() -> Self {
        let mut bots = BTreeMap::new();
        bots.insert(
            TransportKind::Feishu.name().to_string(),
            BotConfig {
                enabled: false,
                secret_env: Some("FEISHU_HOOK".to_string()),
                key: None,
                chat_id: None,
            },
        );
        Self {
            digest: DigestConfig::default(),
            fetch: FetchConfig::default(),
            filter: FilterConfig::default(),
            sources: SourcesConfig::default(),
            push: PushConfig::default(),
            bots,
        }
    }
}

impl YarbConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.push.budget == 0 {
            return Err(ConfigError::Validation(
                "push.budget must be greater than 0".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.fetch.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "fetch.max_workers must be at least 1".into(),
            ));
        }
        for list in &self.sources.lists {
            if list.file.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sources.lists '{}' needs a file name",
                    list.name
                )));
            }
        }
        for name in self.bots.keys() {
            if name.parse::<TransportKind>().is_err() {
                let known: Vec<&str> = TransportKind::ALL.iter().map(|k| k.name()).collect();
                return Err(ConfigError::Validation(format!(
                    "unknown bot '{name}' (known: {})",
                    known.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Bots with `enabled = true`, in name order.
    pub fn enabled_bots(&self) -> impl Iterator<Item = (&str, &BotConfig)> {
        self.bots
            .iter()
            .filter(|(_, bot)| bot.enabled)
            .map(|(name, bot)| (name.as_str(), bot))
    }
}

/// Digest titles and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestConfig {
    /// Heading text of the generated digest; the date is appended.
    pub title_prefix: String,
    /// Title used when a markdown digest has no `# heading`.
    pub fallback_title: String,
    /// Directory holding `today.md`, `temp_data.json` and `rss/`.
    pub output_dir: PathBuf,
    /// Archive directory, relative to `output_dir`.
    pub archive_dir: PathBuf,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            title_prefix: "每日安全资讯".to_string(),
            fallback_title: crate::markdown::FALLBACK_TITLE.to_string(),
            output_dir: PathBuf::from("."),
            archive_dir: PathBuf::from("archive"),
        }
    }
}

/// HTTP settings for feed retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    /// Maximum number of feeds fetched in parallel.
    /// When absent, defaults to [`DEFAULT_FETCH_WORKERS`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0".to_string(),
            accept_language: "zh-CN,zh;q=0.9".to_string(),
            max_workers: None,
        }
    }
}

/// Parallel fetches when `fetch.max_workers` is not set.
///
/// Fetch threads spend their time waiting on the network, so this is not
/// tied to the number of CPU cores.
pub const DEFAULT_FETCH_WORKERS: usize = 32;

/// Resolve the effective fetch worker count from config.
///
/// - `None` → [`DEFAULT_FETCH_WORKERS`]
/// - `Some(n)` → `n`, as given
pub fn effective_workers(config: &FetchConfig) -> usize {
    config.max_workers.unwrap_or(DEFAULT_FETCH_WORKERS)
}

/// Entry filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Entries whose title contains any of these keywords are dropped.
    pub exclude: Vec<String>,
}

/// Where feed URLs come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// Feed URLs fetched directly.
    pub feeds: Vec<String>,
    /// OPML subscription lists.
    pub lists: Vec<ListSource>,
}

/// One OPML subscription list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSource {
    pub name: String,
    /// Remote OPML, downloaded on `--update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local file name under `<output_dir>/rss/`.
    pub file: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Message size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushConfig {
    /// Maximum encoded size of one message, in bytes.
    pub budget: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { budget: 20 * 1024 }
    }
}

/// One bot entry under `[bots.<name>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    pub enabled: bool,
    /// Environment variable holding the credential (checked first).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
    /// Literal credential, used when `secret_env` is unset or empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Target chat, for bots that post through a shared bot account
    /// (`telegram`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(YarbConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<YarbConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: YarbConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is missing.
pub fn load_config(path: &Path) -> Result<YarbConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# yarb configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Digest
# ---------------------------------------------------------------------------
[digest]
# Heading of the generated digest. The run date is appended: "<prefix>（YYYY-MM-DD）".
title_prefix = "每日安全资讯"

# Title used when a markdown digest handed to `push` has no "# heading".
fallback_title = "每日安全资讯"

# Directory holding today.md, temp_data.json and downloaded lists (rss/).
output_dir = "."

# Dated copies go to <output_dir>/<archive_dir>/<YYYY>/<YYYY-MM-DD>.md
archive_dir = "archive"

# ---------------------------------------------------------------------------
# Feed retrieval
# ---------------------------------------------------------------------------
[fetch]
# Per-request timeout in seconds.
timeout_secs = 10
user_agent = "Mozilla/5.0"
accept_language = "zh-CN,zh;q=0.9"

# Maximum feeds fetched in parallel. Fetching waits on the network, so this
# may exceed the number of CPU cores.
# max_workers = 32

# ---------------------------------------------------------------------------
# Filtering
# ---------------------------------------------------------------------------
[filter]
# Entries whose title contains any of these keywords are dropped.
exclude = []

# ---------------------------------------------------------------------------
# Sources
# ---------------------------------------------------------------------------
[sources]
# Feed URLs fetched directly.
feeds = []

# OPML subscription lists. `url` is refreshed into rss/<file> with --update;
# without it (or when the download fails) the local file is used.
# [[sources.lists]]
# name = "CyberSecurityRSS"
# url = "https://example.com/CyberSecurityRSS.opml"
# file = "CyberSecurityRSS.opml"
# enabled = true

# ---------------------------------------------------------------------------
# Push
# ---------------------------------------------------------------------------
[push]
# Maximum encoded size of one message, in bytes. Longer digests are split.
budget = 20480

# ---------------------------------------------------------------------------
# Bots
# ---------------------------------------------------------------------------
# Known bots: feishu, telegram, stdout.
[bots.feishu]
enabled = false
# Environment variable holding the webhook URL (checked first).
secret_env = "FEISHU_HOOK"
# Literal webhook URL, used when the variable is unset.
# key = "https://open.feishu.cn/open-apis/bot/v2/hook/..."

# Telegram sends each message as plain text through the Bot API.
# [bots.telegram]
# enabled = true
# secret_env = "TELEGRAM_TOKEN"   # Bot token from @BotFather
# chat_id = "-1001234567890"
"##
}
