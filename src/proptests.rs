//! Property-based tests for the parse → chunk pipeline.
//!
//! These tests verify the chunker's invariants hold for arbitrary documents:
//!
//! - Flattening the chunks gives back the document's content in order
//! - Every chunk not flagged oversized encodes within budget
//! - Oversized chunks hold a single indivisible node
//! - Appending a node always grows the encoded size
//! - Chunking the output again keeps the same content

use proptest::prelude::*;

use crate::chunker::{Chunk, chunk};
use crate::markdown;
use crate::payload::{FeishuPost, PayloadEncoder};
use crate::test_helpers::merge_text_runs;
use crate::types::{Document, Group, Node};

fn text_node() -> impl Strategy<Value = Node> {
    "[a-z 安全资讯\"\\\\\t]{1,80}".prop_map(Node::text)
}

fn link_node() -> impl Strategy<Value = Node> {
    ("[a-zA-Z 漏洞]{1,30}", "https://[a-z]{1,10}\\.example/[a-z0-9/?=&]{0,40}")
        .prop_map(|(text, href)| Node::link(text, href))
}

fn node() -> impl Strategy<Value = Node> {
    prop_oneof![text_node(), link_node()]
}

fn group() -> impl Strategy<Value = Group> {
    prop::collection::vec(node(), 1..6)
}

fn document() -> impl Strategy<Value = Document> {
    ("[A-Za-z 资讯]{0,20}", prop::collection::vec(group(), 0..12))
        .prop_map(|(title, paragraphs)| Document::new(title, paragraphs))
}

fn flattened(chunks: &[Chunk]) -> Vec<Node> {
    merge_text_runs(chunks.iter().flat_map(Chunk::nodes))
}

// ==================== Chunker Property Tests ====================

proptest! {
    /// Chunk content, with split text runs joined, equals the document's.
    #[test]
    fn chunks_preserve_content(doc in document(), budget in 120usize..800) {
        let chunks = chunk(&doc, budget, &FeishuPost);
        let expected = merge_text_runs(doc.paragraphs.iter().flatten());
        prop_assert_eq!(flattened(&chunks), expected);
    }

    /// Only oversized chunks may exceed the budget, and they hold one node.
    #[test]
    fn chunks_respect_budget(doc in document(), budget in 120usize..800) {
        for c in chunk(&doc, budget, &FeishuPost) {
            prop_assert_eq!(c.encoded_len, FeishuPost.encoded_len(&doc.title, &c.groups));
            if c.oversized {
                prop_assert!(c.encoded_len > budget);
                prop_assert_eq!(c.nodes().count(), 1);
            } else {
                prop_assert!(c.encoded_len <= budget);
            }
        }
    }

    /// No chunk is empty, and no group inside a chunk is empty.
    #[test]
    fn chunks_have_no_empty_parts(doc in document(), budget in 120usize..800) {
        for c in chunk(&doc, budget, &FeishuPost) {
            prop_assert!(!c.groups.is_empty());
            for g in &c.groups {
                prop_assert!(!g.is_empty());
            }
            for n in c.nodes() {
                prop_assert!(n.is_link() || !n.label().is_empty());
            }
        }
    }

    /// Splitting a long run never produces a piece that is not a substring
    /// starting where the previous one ended.
    #[test]
    fn text_pieces_tile_the_source(text in "[a-z安全资讯\"]{1,400}", budget in 100usize..300) {
        let doc = Document::new("t", vec![vec![Node::text(text.clone())]]);
        let mut offset = 0;
        for n in chunk(&doc, budget, &FeishuPost).iter().flat_map(Chunk::nodes) {
            let piece = n.label();
            prop_assert!(text.is_char_boundary(offset));
            prop_assert!(text[offset..].starts_with(piece));
            offset += piece.len();
        }
        prop_assert_eq!(offset, text.len());
    }

    /// Appending a non-empty node strictly grows the encoded size.
    #[test]
    fn appending_grows_size(
        title in "[A-Za-z ]{0,10}",
        mut groups in prop::collection::vec(group(), 1..5),
        extra in node(),
    ) {
        let before = FeishuPost.encoded_len(&title, &groups);
        if let Some(last) = groups.last_mut() {
            last.push(extra.clone());
        }
        prop_assert!(FeishuPost.encoded_len(&title, &groups) > before);

        groups.push(vec![extra]);
        let appended_group = FeishuPost.encoded_len(&title, &groups);
        groups.pop();
        prop_assert!(appended_group > FeishuPost.encoded_len(&title, &groups));
    }

    /// Chunking the output again keeps the same content in the same order.
    #[test]
    fn rechunking_keeps_content(doc in document(), budget in 120usize..800) {
        let first = chunk(&doc, budget, &FeishuPost);
        let regrouped = Document::new(
            doc.title.clone(),
            first.iter().flat_map(|c| c.groups.iter().cloned()).collect(),
        );
        let second = chunk(&regrouped, budget, &FeishuPost);
        prop_assert_eq!(flattened(&second), flattened(&first));
    }
}

// ==================== Parser Property Tests ====================

proptest! {
    /// Link bullets survive a render → parse round trip.
    #[test]
    fn bullet_links_parse_back(
        label in "[a-zA-Z0-9 安全]{1,30}",
        href in "https://[a-z]{1,10}\\.example/[a-z0-9]{0,20}",
    ) {
        let md = format!("# Daily\n\n- Feed\n  - [{label}]({href})\n");
        let doc = markdown::parse(&md);
        prop_assert_eq!(doc.title, "Daily");
        prop_assert_eq!(&doc.paragraphs[1], &vec![Node::link(label.clone(), href.clone())]);
    }

    /// A line without brackets or markers is one text node.
    #[test]
    fn plain_lines_are_text(line in "[a-z安全 ]{1,60}") {
        prop_assume!(!line.trim().is_empty());
        let doc = markdown::parse(&line);
        prop_assert_eq!(doc.paragraphs.len(), 1);
        prop_assert_eq!(&doc.paragraphs[0], &vec![Node::text(line.trim())]);
    }
}
