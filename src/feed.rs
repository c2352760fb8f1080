//! Feed stage: where feeds come from, fetching them, and picking entries.
//!
//! ## Sources
//!
//! Feed URLs come from `sources.feeds` and from OPML subscription lists. Each
//! enabled list lives at `<output_dir>/rss/<file>`; with `--update` a list
//! that has a `url` is downloaded first, falling back to the local copy when
//! the download fails. Every `<outline>` element carrying an `xmlUrl` is a
//! feed.
//!
//! ## Formats
//!
//! | Root | Feed title | Entries | Date |
//! |------|------------|---------|------|
//! | `<rss>` | `channel/title` | `channel/item` | `pubDate` (RFC 2822) |
//! | `<rdf:RDF>` | `channel/title` | `item` | `dc:date` (RFC 3339) |
//! | `<feed>` (Atom) | `title` | `entry` | `published`, else `updated` |
//!
//! Either date syntax is accepted in any element.
//!
//! ## Selection
//!
//! An entry is kept when it was published on the day before the run date
//! (UTC) and its title contains none of the excluded keywords. Undated
//! entries are dropped; a feed that keeps nothing does not appear in the
//! digest. A feed that fails to download or parse is logged and skipped.

use crate::config::{FetchConfig, SourcesConfig};
use crate::context::RunContext;
use crate::digest::{DigestEntry, FeedDigest};
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use roxmltree::Node as XmlNode;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("not a feed: root element <{0}>")]
    NotAFeed(String),
}

/// A parsed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub title: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_xml(xml: &str) -> Result<roxmltree::Document<'_>, FeedError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Ok(roxmltree::Document::parse_with_options(xml, options)?)
}

/// Parse an RSS 2.0, RSS 1.0 (RDF) or Atom document.
pub fn parse_feed(xml: &str) -> Result<Feed, FeedError> {
    let doc = parse_xml(xml)?;
    let root = doc.root_element();
    match root.tag_name().name() {
        "rss" => {
            let channel = child(root, "channel")
                .ok_or_else(|| FeedError::NotAFeed("rss without channel".to_string()))?;
            Ok(Feed {
                title: child_text(channel, "title"),
                entries: elements(channel, "item").map(rss_entry).collect(),
            })
        }
        "RDF" => Ok(Feed {
            title: child(root, "channel")
                .map(|channel| child_text(channel, "title"))
                .unwrap_or_default(),
            entries: elements(root, "item").map(rss_entry).collect(),
        }),
        "feed" => Ok(Feed {
            title: child_text(root, "title"),
            entries: elements(root, "entry").map(atom_entry).collect(),
        }),
        other => Err(FeedError::NotAFeed(other.to_string())),
    }
}

fn rss_entry(item: XmlNode) -> Entry {
    let published = ["pubDate", "date", "published", "updated"]
        .into_iter()
        .find_map(|name| child(item, name).and_then(|n| parse_date(&node_text(n))));
    Entry {
        title: child_text(item, "title"),
        link: child_text(item, "link"),
        published,
    }
}

fn atom_entry(entry: XmlNode) -> Entry {
    let link = elements(entry, "link")
        .find(|l| matches!(l.attribute("rel"), None | Some("alternate")))
        .or_else(|| child(entry, "link"))
        .and_then(|l| l.attribute("href"))
        .unwrap_or_default()
        .to_string();
    let published = ["published", "updated"]
        .into_iter()
        .find_map(|name| child(entry, name).and_then(|n| parse_date(&node_text(n))));
    Entry {
        title: child_text(entry, "title"),
        link,
        published,
    }
}

/// Feed URLs listed in an OPML document, in order, without duplicates.
pub fn parse_opml(xml: &str) -> Result<Vec<String>, FeedError> {
    let doc = parse_xml(xml)?;
    let mut urls: Vec<String> = Vec::new();
    for outline in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "outline")
    {
        let Some(url) = outline.attribute("xmlUrl").map(str::trim) else {
            continue;
        };
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// RFC 2822 (`Mon, 19 Oct 2026 08:00:00 +0800`) or RFC 3339.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn elements<'a, 'input: 'a>(
    parent: XmlNode<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    parent
        .children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'input: 'a>(parent: XmlNode<'a, 'input>, name: &'static str) -> Option<XmlNode<'a, 'input>> {
    elements(parent, name).next()
}

fn child_text(parent: XmlNode, name: &'static str) -> String {
    child(parent, name).map(node_text).unwrap_or_default()
}

/// Concatenated text content (CDATA included), whitespace-trimmed.
fn node_text(node: XmlNode) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

// ============================================================================
// Selection
// ============================================================================

/// Keep entries published on `day` whose title has no excluded keyword.
///
/// Returns `None` when nothing is kept.
pub fn select_entries(feed: &Feed, url: &str, day: NaiveDate, exclude: &[String]) -> Option<FeedDigest> {
    let kept = feed
        .entries
        .iter()
        .filter(|e| e.published.is_some_and(|d| d.date_naive() == day))
        .filter(|e| !exclude.iter().any(|word| e.title.contains(word.as_str())))
        .map(|e| DigestEntry {
            title: e.title.clone(),
            link: e.link.clone(),
        });
    let digest = FeedDigest::new(&feed.title, url, kept);
    (!digest.entries.is_empty()).then_some(digest)
}

// ============================================================================
// Retrieval
// ============================================================================

/// Blocking HTTP client with the configured headers and timeout.
pub struct Fetcher {
    agent: ureq::Agent,
    user_agent: String,
    accept_language: String,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build(),
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        }
    }

    /// GET `url` and return the body. Non-2xx responses are errors.
    pub fn get(&self, url: &str) -> Result<String, FeedError> {
        let http_error = |message: String| FeedError::Http {
            url: url.to_string(),
            message,
        };
        let response = self
            .agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept-Language", &self.accept_language)
            .call()
            .map_err(|e| http_error(e.to_string()))?;
        Ok(response.into_string()?)
    }
}

/// Collect feed URLs from `sources.feeds` and every enabled list.
///
/// With `update`, lists with a `url` are refreshed through `download` first.
/// Missing or unreadable lists are skipped with a warning.
pub fn resolve_sources(
    sources: &SourcesConfig,
    ctx: &RunContext,
    update: bool,
    download: impl Fn(&str) -> Result<String, FeedError>,
) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut add = |url: String| {
        if !urls.contains(&url) {
            urls.push(url);
        }
    };
    for url in &sources.feeds {
        add(url.trim().to_string());
    }

    for list in sources.lists.iter().filter(|l| l.enabled) {
        let path = ctx.list_path(&list.file);
        if let Some(url) = list.url.as_deref().filter(|_| update) {
            match refresh_list(url, &path, &download) {
                Ok(()) => info!(list = %list.name, "updated subscription list"),
                Err(e) if path.exists() => {
                    warn!(list = %list.name, error = %e, "update failed, using local copy")
                }
                Err(e) => {
                    warn!(list = %list.name, error = %e, "update failed, skipping list");
                    continue;
                }
            }
        }

        let listed = fs::read_to_string(&path)
            .map_err(FeedError::from)
            .and_then(|xml| parse_opml(&xml));
        match listed {
            Ok(feeds) => {
                debug!(list = %list.name, feeds = feeds.len(), "read subscription list");
                feeds.into_iter().for_each(&mut add);
            }
            Err(e) => warn!(list = %list.name, path = %path.display(), error = %e, "skipping list"),
        }
    }
    urls
}

fn refresh_list(
    url: &str,
    path: &Path,
    download: &impl Fn(&str) -> Result<String, FeedError>,
) -> Result<(), FeedError> {
    let body = download(url)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

/// Fetch, parse and select every feed in parallel on the rayon pool.
///
/// Output follows the order of `urls`; failed and empty feeds are left out.
pub fn collect_digests(
    urls: &[String],
    day: NaiveDate,
    exclude: &[String],
    fetch: impl Fn(&str) -> Result<String, FeedError> + Sync,
) -> Vec<FeedDigest> {
    let digests: Vec<Option<FeedDigest>> = urls
        .par_iter()
        .map(|url| {
            let feed = match fetch(url).and_then(|body| parse_feed(&body)) {
                Ok(feed) => feed,
                Err(e) => {
                    warn!(url = %url, error = %e, "feed failed");
                    return None;
                }
            };
            let selected = select_entries(&feed, url, day, exclude);
            info!(
                feed = %feed.title,
                url = %url,
                selected = selected.as_ref().map_or(0, |d| d.entries.len()),
                total = feed.entries.len(),
                "fetched feed"
            );
            selected
        })
        .collect();
    digests.into_iter().flatten().collect()
}
