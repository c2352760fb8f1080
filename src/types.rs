//! Document model shared by the parser, the payload encoder and the chunker.
//!
//! A digest is a title plus an ordered list of paragraphs. Each paragraph is a
//! [`Group`] of inline [`Node`]s. The same `Group` type is reused for the
//! fragments the chunker produces when a paragraph has to be split, so a chunk
//! is simply a list of groups.
//!
//! `Node` serializes directly into the rich-text element shape used by the
//! Feishu `post` message (`{"tag": "text", ...}` / `{"tag": "a", ...}`).

use serde::{Deserialize, Serialize};

/// One inline element of a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Node {
    /// Plain text run.
    #[serde(rename = "text")]
    Text { text: String },
    /// Inline hyperlink: display label plus target.
    #[serde(rename = "a")]
    Link { text: String, href: String },
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Node::Link {
            text: text.into(),
            href: href.into(),
        }
    }

    /// Display text of the node (the label for links).
    pub fn label(&self) -> &str {
        match self {
            Node::Text { text } | Node::Link { text, .. } => text,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Node::Link { .. })
    }
}

/// Ordered run of nodes: one source paragraph, or a split fragment of one.
pub type Group = Vec<Node>;

/// Parsed digest, built once per run and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub paragraphs: Vec<Group>,
}

impl Document {
    pub fn new(title: impl Into<String>, paragraphs: Vec<Group>) -> Self {
        Self {
            title: title.into(),
            paragraphs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Total number of inline nodes across all paragraphs.
    pub fn node_count(&self) -> usize {
        self.paragraphs.iter().map(Vec::len).sum()
    }
}
