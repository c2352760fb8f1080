//! Restricted markdown reader for digest files.
//!
//! Only three constructs are recognized:
//!
//! - `# Title`: the first level-1 heading becomes the document title
//! - `- item`: bullet markers (`-`, `*`, `+`) are stripped from the line
//! - `[label](target)`: inline links anywhere in a line
//!
//! Every other non-empty line becomes one paragraph of plain text. The reader
//! never fails: anything it does not understand is passed through as text.
//!
//! ```text
//! # 每日安全资讯（2026-10-19）        → title
//!
//! - Example Blog                      → [Text("Example Blog")]
//!   - [Post title](https://x.y/1)     → [Link("Post title", "https://x.y/1")]
//! ```

use crate::types::{Document, Group, Node};

/// Title used when the markdown has no `# heading` line.
pub const FALLBACK_TITLE: &str = "每日安全资讯";

const BULLET_MARKERS: [char; 3] = ['-', '*', '+'];

/// Parse markdown into a [`Document`], using [`FALLBACK_TITLE`] if untitled.
pub fn parse(markdown: &str) -> Document {
    parse_with_fallback(markdown, FALLBACK_TITLE)
}

/// Parse markdown into a [`Document`] with a caller-supplied fallback title.
pub fn parse_with_fallback(markdown: &str, fallback_title: &str) -> Document {
    let mut title: Option<String> = None;
    let mut paragraphs = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = line.strip_prefix("# ") {
            // Later headings are consumed without producing a paragraph.
            title.get_or_insert_with(|| heading.trim().to_string());
            continue;
        }

        paragraphs.push(parse_inline(strip_bullet(line)));
    }

    Document {
        title: title.unwrap_or_else(|| fallback_title.to_string()),
        paragraphs,
    }
}

/// Remove a leading bullet marker and the whitespace after it.
///
/// A marker only counts when followed by whitespace, so `-1` or `*bold*`
/// are left untouched.
fn strip_bullet(line: &str) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(marker), Some(next)) if BULLET_MARKERS.contains(&marker) && next.is_whitespace() => {
            line[marker.len_utf8()..].trim_start()
        }
        _ => line,
    }
}

/// Split one line into text and link nodes with a single left-to-right scan.
pub fn parse_inline(line: &str) -> Group {
    let mut nodes = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = line[cursor..].find('[') {
        let open = cursor + offset;
        match match_link(&line[open..]) {
            Some(link) => {
                if open > literal_start {
                    nodes.push(Node::text(&line[literal_start..open]));
                }
                nodes.push(Node::link(link.label, link.target));
                cursor = open + link.len;
                literal_start = cursor;
            }
            None => cursor = open + 1,
        }
    }

    if literal_start < line.len() {
        nodes.push(Node::text(&line[literal_start..]));
    }

    nodes
}

struct LinkSpan<'a> {
    label: &'a str,
    target: &'a str,
    /// Byte length of the whole `[label](target)` span.
    len: usize,
}

/// Match `[label](target)` at the start of `s`.
///
/// The label runs to the first `]` and the target to the first `)`; both
/// must be non-empty and the `(` must follow the `]` directly.
fn match_link(s: &str) -> Option<LinkSpan<'_>> {
    let rest = s.strip_prefix('[')?;
    let label_end = rest.find(']')?;
    if label_end == 0 {
        return None;
    }
    let label = &rest[..label_end];

    let after_label = rest[label_end + 1..].strip_prefix('(')?;
    let target_end = after_label.find(')')?;
    if target_end == 0 {
        return None;
    }
    let target = &after_label[..target_end];

    // '[' + label + "](" + target + ')'
    let len = 1 + label.len() + 2 + target.len() + 1;
    Some(LinkSpan { label, target, len })
}
