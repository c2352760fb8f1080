//! Shared test utilities for the yarb test suite.
//!
//! Provides document builders, chunk-plan assertions, and in-memory
//! transports that record or reject payloads.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = digest_document(3, 2);
//! let chunks = chunk(&doc, 512, &FeishuPost);
//!
//! assert_round_trip(&doc, &chunks);
//! assert_budget_respected(&chunks, 512);
//! ```

use std::sync::Mutex;

use crate::chunker::Chunk;
use crate::transport::{Transport, TransportError};
use crate::types::{Document, Node};

// =========================================================================
// Document builders
// =========================================================================

/// A digest-shaped document: `feeds` feed headers, each followed by
/// `entries` link paragraphs.
pub fn digest_document(feeds: usize, entries: usize) -> Document {
    let mut paragraphs = Vec::new();
    for f in 0..feeds {
        paragraphs.push(vec![Node::text(format!("Feed {f}"))]);
        for e in 0..entries {
            paragraphs.push(vec![Node::link(
                format!("Entry {f}-{e}"),
                format!("https://example.com/{f}/{e}"),
            )]);
        }
    }
    Document::new("Daily digest", paragraphs)
}

// =========================================================================
// Chunk-plan assertions
// =========================================================================

/// Flatten nodes and join consecutive text nodes into one.
pub fn merge_text_runs<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::new();
    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(Node::Text { text: prev }), Node::Text { text }) => prev.push_str(text),
            _ => merged.push(node.clone()),
        }
    }
    merged
}

/// Assert the chunks carry exactly the document's content, in order.
pub fn assert_round_trip(doc: &Document, chunks: &[Chunk]) {
    let expected = merge_text_runs(doc.paragraphs.iter().flatten());
    let actual = merge_text_runs(chunks.iter().flat_map(Chunk::nodes));
    assert_eq!(actual, expected, "chunk content differs from document");
}

/// Assert every chunk not flagged oversized is within `budget`.
pub fn assert_budget_respected(chunks: &[Chunk], budget: usize) {
    for (i, chunk) in chunks.iter().enumerate() {
        assert!(
            chunk.oversized || chunk.encoded_len <= budget,
            "chunk {i} is {} bytes, budget {budget}",
            chunk.encoded_len
        );
    }
}

// =========================================================================
// In-memory transports
// =========================================================================

/// Transport that keeps every payload it receives.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// Transport that rejects the payloads at the given positions.
pub struct FlakyTransport {
    pub fail_at: Vec<usize>,
    pub attempts: Mutex<usize>,
}

impl FlakyTransport {
    pub fn failing_at(fail_at: &[usize]) -> Self {
        Self {
            fail_at: fail_at.to_vec(),
            attempts: Mutex::new(0),
        }
    }
}

impl Transport for FlakyTransport {
    fn name(&self) -> &str {
        "flaky"
    }

    fn send(&self, _payload: &[u8]) -> Result<(), TransportError> {
        let mut attempts = self.attempts.lock().unwrap();
        let index = *attempts;
        *attempts += 1;
        if self.fail_at.contains(&index) {
            Err(TransportError::Rejected {
                status: 500,
                body: format!("refused payload {index}"),
            })
        } else {
            Ok(())
        }
    }
}
