//! Ordered delivery of chunks over a [`Transport`].
//!
//! Chunks are sent one at a time, in order, with no transaction across them.
//! A failed send is recorded and logged, and the remaining chunks are still
//! attempted: a partial digest is better than none. Retrying is left to the
//! transport.

use crate::chunker::{self, Chunk};
use crate::markdown;
use crate::payload::PayloadEncoder;
use crate::transport::{Transport, TransportError};
use tracing::{debug, info, warn};

/// Result of sending one chunk.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Position of the chunk in the digest.
    pub index: usize,
    /// Encoded payload size.
    pub bytes: usize,
    pub oversized: bool,
    pub result: Result<(), TransportError>,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-chunk outcomes of one dispatch to one transport.
#[derive(Debug)]
pub struct DispatchReport {
    pub transport: String,
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed() == 0
    }
}

/// Encode and send every chunk in order. Never stops early.
pub fn dispatch(
    title: &str,
    chunks: &[Chunk],
    encoder: &impl PayloadEncoder,
    transport: &dyn Transport,
) -> DispatchReport {
    let outcomes = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let payload = chunk.encode(title, encoder);
            let result = transport.send(&payload);
            match &result {
                Ok(()) => debug!(transport = transport.name(), index, bytes = payload.len(), "sent chunk"),
                Err(e) => warn!(
                    transport = transport.name(),
                    index,
                    total = chunks.len(),
                    error = %e,
                    "chunk not delivered"
                ),
            }
            DispatchOutcome {
                index,
                bytes: payload.len(),
                oversized: chunk.oversized,
                result,
            }
        })
        .collect();

    let report = DispatchReport {
        transport: transport.name().to_string(),
        outcomes,
    };
    info!(
        transport = %report.transport,
        delivered = report.delivered(),
        failed = report.failed(),
        "dispatch finished"
    );
    report
}

/// Parse a markdown digest, chunk it once, and dispatch it to every transport.
pub fn push_markdown(
    markdown_text: &str,
    fallback_title: &str,
    budget: usize,
    encoder: &impl PayloadEncoder,
    transports: &[Box<dyn Transport>],
) -> Vec<DispatchReport> {
    let document = markdown::parse_with_fallback(markdown_text, fallback_title);
    let chunks = chunker::chunk(&document, budget, encoder);
    transports
        .iter()
        .map(|transport| dispatch(&document.title, &chunks, encoder, transport.as_ref()))
        .collect()
}
