//! Size-bounded packing of a [`Document`] into transport payloads.
//!
//! Chat transports reject messages above a fixed byte size, so a digest has to
//! be split across several messages. Every message repeats the document title
//! and carries an ordered run of groups; its *encoded* size (title included)
//! must stay within the budget.
//!
//! # Strategy
//!
//! One greedy, order-preserving pass over the paragraphs:
//!
//! 1. Whole paragraphs are appended to the current buffer while the buffer
//!    still encodes within budget.
//! 2. A paragraph that does not fit seals the buffer, then is rebuilt node by
//!    node into a fresh group. Links move as a unit: a link that does not fit
//!    seals the group built so far and starts the next one. Text runs are cut
//!    at the longest character-aligned prefix that still fits.
//! 3. The last partial group of a split paragraph goes back into the buffer,
//!    so short trailing fragments still share a message with what follows.
//!
//! Nothing is dropped, reordered or duplicated: flattening the chunks yields
//! the original nodes, except that long text runs appear as several
//! consecutive text nodes whose concatenation is the original text.
//!
//! # Oversized units
//!
//! A single link, or a single character, may not fit next to the title even
//! on its own. Such a unit is sent alone in a chunk marked
//! [`Chunk::oversized`] and a warning is logged; it is never dropped.

use crate::payload::PayloadEncoder;
use crate::types::{Document, Group, Node};
use std::slice;
use tracing::{debug, warn};

/// Content of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub groups: Vec<Group>,
    /// Encoded size of this chunk together with the title.
    pub encoded_len: usize,
    /// The chunk exceeds the budget because it holds a unit that cannot be
    /// split further.
    pub oversized: bool,
}

impl Chunk {
    /// All nodes of the chunk in order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.groups.iter().flatten()
    }

    /// Encode the chunk as a transport payload.
    pub fn encode(&self, title: &str, encoder: &impl PayloadEncoder) -> Vec<u8> {
        encoder.encode(title, &self.groups)
    }
}

/// Split `document` into chunks whose encoded size is at most `budget` bytes.
///
/// See the [module documentation](self) for the packing strategy.
pub fn chunk(document: &Document, budget: usize, encoder: &impl PayloadEncoder) -> Vec<Chunk> {
    let mut packer = Packer {
        title: &document.title,
        budget,
        encoder,
        chunks: Vec::new(),
    };

    let mut buffer: Vec<Group> = Vec::new();
    for paragraph in &document.paragraphs {
        buffer.push(paragraph.clone());
        if packer.fits(&buffer) {
            continue;
        }
        buffer.pop();

        packer.seal(std::mem::take(&mut buffer));
        let tail = packer.split_paragraph(paragraph);
        if !tail.is_empty() {
            buffer.push(tail);
        }
    }
    packer.seal(buffer);

    debug!(
        paragraphs = document.paragraphs.len(),
        chunks = packer.chunks.len(),
        budget,
        "chunked document"
    );
    packer.chunks
}

struct Packer<'a, E: ?Sized> {
    title: &'a str,
    budget: usize,
    encoder: &'a E,
    chunks: Vec<Chunk>,
}

impl<E: PayloadEncoder + ?Sized> Packer<'_, E> {
    fn encoded_len(&self, groups: &[Group]) -> usize {
        self.encoder.encoded_len(self.title, groups)
    }

    fn fits(&self, groups: &[Group]) -> bool {
        self.encoded_len(groups) <= self.budget
    }

    fn group_fits(&self, group: &Group) -> bool {
        self.fits(slice::from_ref(group))
    }

    /// Close a chunk. Empty input is ignored.
    fn seal(&mut self, groups: Vec<Group>) {
        if groups.is_empty() {
            return;
        }
        let encoded_len = self.encoded_len(&groups);
        let oversized = encoded_len > self.budget;
        if oversized {
            warn!(
                encoded_len,
                budget = self.budget,
                index = self.chunks.len(),
                "unit does not fit the budget even alone; sending it oversized"
            );
        }
        self.chunks.push(Chunk {
            groups,
            encoded_len,
            oversized,
        });
    }

    /// Seal `group` as a chunk of its own and leave it empty.
    fn seal_group(&mut self, group: &mut Group) {
        if !group.is_empty() {
            let sealed = std::mem::take(group);
            self.seal(vec![sealed]);
        }
    }

    /// Rebuild a paragraph that does not fit, sealing full groups on the way.
    ///
    /// Returns the trailing group that has not been sealed yet.
    fn split_paragraph(&mut self, paragraph: &Group) -> Group {
        let mut group = Group::new();
        for node in paragraph {
            match node {
                Node::Link { .. } => self.push_whole(&mut group, node.clone()),
                Node::Text { text } => self.push_text(&mut group, text),
            }
        }
        group
    }

    /// Append a node that is never cut: a link, or an empty text node.
    fn push_whole(&mut self, group: &mut Group, node: Node) {
        group.push(node);
        if group.len() > 1 && !self.group_fits(group) {
            if let Some(node) = group.pop() {
                self.seal_group(group);
                group.push(node);
            }
        }
    }

    fn push_text(&mut self, group: &mut Group, text: &str) {
        if text.is_empty() {
            self.push_whole(group, Node::text(""));
            return;
        }
        let mut rest = text;
        while !rest.is_empty() {
            let mut cut = self.fitting_prefix_len(group, rest);
            if cut == 0 {
                if !group.is_empty() {
                    self.seal_group(group);
                    continue;
                }
                // Not even one character fits next to the title.
                cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            group.push(Node::text(&rest[..cut]));
            rest = &rest[cut..];
        }
    }

    /// Byte length of the longest prefix of `text` that, appended to `group`
    /// as a text node, keeps the group within budget. Always a char boundary.
    fn fitting_prefix_len(&self, group: &mut Group, text: &str) -> usize {
        let base = self.probe_len(group, "");
        if base > self.budget {
            return 0;
        }
        // Encoded text is never shorter than its UTF-8 bytes, so nothing
        // beyond the remaining allowance can fit.
        let allowance = self.budget - base;
        let ends: Vec<usize> = text
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .take_while(|&end| end <= allowance)
            .collect();

        let fitting = ends.partition_point(|&end| self.probe_len(group, &text[..end]) <= self.budget);
        match fitting {
            0 => 0,
            n => ends[n - 1],
        }
    }

    /// Encoded size of `group` with `piece` appended as a text node.
    fn probe_len(&self, group: &mut Group, piece: &str) -> usize {
        group.push(Node::text(piece));
        let len = self.encoded_len(slice::from_ref(group));
        group.pop();
        len
    }
}
