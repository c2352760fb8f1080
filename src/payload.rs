//! Wire encoding of digest chunks.
//!
//! Chunks are delivered as Feishu `post` rich-text messages:
//!
//! ```json
//! {"msg_type":"post","content":{"post":{"zh_cn":{
//!     "title":"...",
//!     "content":[[{"tag":"text","text":"..."},{"tag":"a","text":"...","href":"..."}]]
//! }}}}
//! ```
//!
//! The chunker uses [`PayloadEncoder::encoded_len`] as a size oracle before
//! committing to a split, so it must agree exactly with the length of
//! [`PayloadEncoder::encode`]. Both go through the same `serde_json`
//! serializer; `encoded_len` only swaps the output buffer for a byte counter.

use crate::types::Group;
use serde::Serialize;
use std::io;

/// Deterministic encoding of `(title, groups)` into transport bytes.
pub trait PayloadEncoder {
    /// Serialize the title and groups into one payload.
    fn encode(&self, title: &str, groups: &[Group]) -> Vec<u8>;

    /// Exact byte length of [`encode`](Self::encode) for the same input.
    fn encoded_len(&self, title: &str, groups: &[Group]) -> usize {
        self.encode(title, groups).len()
    }
}

/// Feishu `post` message with a single `zh_cn` locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeishuPost;

#[derive(Serialize)]
struct PostMessage<'a> {
    msg_type: &'static str,
    content: PostContent<'a>,
}

#[derive(Serialize)]
struct PostContent<'a> {
    post: PostLocales<'a>,
}

#[derive(Serialize)]
struct PostLocales<'a> {
    zh_cn: PostBody<'a>,
}

#[derive(Serialize)]
struct PostBody<'a> {
    title: &'a str,
    content: &'a [Group],
}

impl FeishuPost {
    fn message<'a>(title: &'a str, groups: &'a [Group]) -> PostMessage<'a> {
        PostMessage {
            msg_type: "post",
            content: PostContent {
                post: PostLocales {
                    zh_cn: PostBody {
                        title,
                        content: groups,
                    },
                },
            },
        }
    }
}

impl PayloadEncoder for FeishuPost {
    fn encode(&self, title: &str, groups: &[Group]) -> Vec<u8> {
        // Only strings and sequences are serialized; this cannot fail.
        serde_json::to_vec(&Self::message(title, groups)).expect("post message must serialize")
    }

    fn encoded_len(&self, title: &str, groups: &[Group]) -> usize {
        let mut counter = ByteCounter::default();
        serde_json::to_writer(&mut counter, &Self::message(title, groups))
            .expect("post message must serialize");
        counter.0
    }
}

/// `io::Write` sink that only counts bytes.
#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
