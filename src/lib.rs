//! # yarb
//!
//! Yet another RSS bot: collects yesterday's posts from a list of feeds,
//! writes them as a markdown digest, and pushes the digest to chat bots as
//! rich-text messages that never exceed the bot's message size limit.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Fetch   feeds, OPML lists  →  temp_data.json          (selected entries)
//! 2. Digest  temp_data.json     →  today.md, archive/…     (markdown)
//! 3. Push    today.md           →  Document → Chunks → bots
//! ```
//!
//! Each stage reads the previous stage's file, so any stage can be rerun on
//! its own: a failed push is retried from `today.md` without refetching.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`feed`] | Stage 1: resolves sources, fetches feeds in parallel, parses RSS/Atom, selects entries |
//! | [`digest`] | Stage 2: renders the markdown digest, writes `today.md`, the archive, and `temp_data.json` |
//! | [`markdown`] | Stage 3: parses digest markdown into a [`types::Document`] |
//! | [`chunker`] | Stage 3: packs a document into budget-bounded chunks |
//! | [`payload`] | Wire encoding of a chunk and the size oracle the chunker probes |
//! | [`dispatch`] | Ordered per-chunk delivery with per-chunk outcomes |
//! | [`transport`] | `Transport` trait, Feishu webhook, Telegram and stdout transports, name registry |
//! | [`context`] | `RunContext`: run date and output paths |
//! | [`schedule`] | Daily `HH:MM` scheduling for unattended runs |
//! | [`config`] | `config.toml` loading, validation, merging over stock defaults |
//! | [`types`] | Document model shared by parser, chunker and encoder |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## Size Measured on the Wire
//!
//! The budget applies to the encoded payload, not to the markdown. JSON
//! escaping, structural overhead and the repeated title all count, so the
//! chunker never estimates: it asks the encoder for the exact length of each
//! candidate ([`payload::PayloadEncoder::encoded_len`]) before committing.
//!
//! ## Nothing Dropped
//!
//! A link that cannot fit next to the title, even alone, is still sent, in a
//! chunk of its own flagged [`chunker::Chunk::oversized`]. The transport may
//! reject it; the rest of the digest is delivered anyway.
//!
//! ## Blocking I/O
//!
//! The pipeline runs once a day and talks to a few dozen hosts. Feeds fan out
//! on the rayon pool with a blocking HTTP client; pushes are sequential so a
//! reader sees chunks in order.

pub mod chunker;
pub mod config;
pub mod context;
pub mod digest;
pub mod dispatch;
pub mod feed;
pub mod markdown;
pub mod output;
pub mod payload;
pub mod schedule;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
mod proptests;
