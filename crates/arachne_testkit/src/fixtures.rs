//! Record and firehose frame fixtures.
//!
//! Builds DAG-CBOR records and complete `#commit` messages the way a relay
//! would send them, so tests can feed real bytes through the decoder.

use arachne_codec::{to_canonical_cbor, ContentHash, Value};
use arachne_protocol::{
    write_car, Action, CommitEvent, FirehoseMessage, PathOp, FOLLOW_COLLECTION,
    IMAGES_EMBED, LIKE_COLLECTION, POST_COLLECTION, REPOST_COLLECTION,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// DID used by fixtures that need an author.
pub const TEST_DID: &str = "did:plc:ghrlooc6r56in4d7n6ljr7qt";

const REV: &str = "3knyxhlmtpc2a";

/// Timestamp used for every fixture record.
pub const CREATED_AT: &str = "2024-03-18T23:02:46.310Z";

/// A text-only post record.
pub fn post_record(text: &str) -> Value {
    Value::map(vec![
        (Value::from("$type"), Value::from(POST_COLLECTION)),
        (Value::from("text"), Value::from(text)),
        (Value::from("langs"), Value::from(vec!["en"])),
        (Value::from("createdAt"), Value::from(CREATED_AT)),
    ])
}

/// A blob reference to `bytes` with the given media type.
pub fn blob_value(bytes: &[u8], mime_type: &str) -> Value {
    Value::map(vec![
        (Value::from("$type"), Value::from("blob")),
        (Value::from("ref"), Value::Link(ContentHash::for_raw(bytes))),
        (Value::from("mimeType"), Value::from(mime_type)),
        (Value::from("size"), Value::from(bytes.len() as u64)),
    ])
}

/// A post with an image embed, one image per `(bytes, mime_type)`.
pub fn post_with_images(text: &str, images: &[(&[u8], &str)]) -> Value {
    let images = images
        .iter()
        .map(|(bytes, mime_type)| {
            Value::map(vec![
                (Value::from("alt"), Value::from("")),
                (Value::from("image"), blob_value(bytes, mime_type)),
                (
                    Value::from("aspectRatio"),
                    Value::map(vec![
                        (Value::from("width"), Value::Integer(1613)),
                        (Value::from("height"), Value::Integer(1613)),
                    ]),
                ),
            ])
        })
        .collect();
    let embed = Value::map(vec![
        (Value::from("$type"), Value::from(IMAGES_EMBED)),
        (Value::from("images"), Value::Array(images)),
    ]);

    let Value::Map(mut pairs) = post_record(text) else {
        unreachable!("post_record builds a map");
    };
    pairs.push((Value::from("embed"), embed));
    Value::map(pairs)
}

fn strong_ref(uri: &str, cid: &ContentHash) -> Value {
    Value::map(vec![
        (Value::from("uri"), Value::from(uri)),
        (Value::from("cid"), Value::from(cid.to_string())),
    ])
}

/// A like of `(uri, cid)`.
pub fn like_record(uri: &str, cid: &ContentHash) -> Value {
    Value::map(vec![
        (Value::from("$type"), Value::from(LIKE_COLLECTION)),
        (Value::from("subject"), strong_ref(uri, cid)),
        (Value::from("createdAt"), Value::from(CREATED_AT)),
    ])
}

/// A repost of `(uri, cid)`.
pub fn repost_record(uri: &str, cid: &ContentHash) -> Value {
    Value::map(vec![
        (Value::from("$type"), Value::from(REPOST_COLLECTION)),
        (Value::from("subject"), strong_ref(uri, cid)),
        (Value::from("createdAt"), Value::from(CREATED_AT)),
    ])
}

/// A follow of `did`.
pub fn follow_record(did: &str) -> Value {
    Value::map(vec![
        (Value::from("$type"), Value::from(FOLLOW_COLLECTION)),
        (Value::from("subject"), Value::from(did)),
        (Value::from("createdAt"), Value::from(CREATED_AT)),
    ])
}

/// Encodes a record and returns its content hash and block bytes.
pub fn record_block(record: &Value) -> (ContentHash, Vec<u8>) {
    let bytes = to_canonical_cbor(record).expect("fixture records encode");
    (ContentHash::for_dag_cbor(&bytes), bytes)
}

/// Builds `#commit` events and messages.
///
/// ```
/// use arachne_testkit::{post_record, CommitBuilder};
///
/// let bytes = CommitBuilder::new("did:plc:abc")
///     .create("app.bsky.feed.post/3k", &post_record("hello"))
///     .delete("app.bsky.feed.like/3j")
///     .message();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    repo: String,
    seq: i64,
    ops: Vec<PathOp>,
    blocks: Vec<(ContentHash, Vec<u8>)>,
    omit_blocks: bool,
}

impl CommitBuilder {
    /// Starts a commit to `repo`.
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            seq: 1,
            ops: Vec::new(),
            blocks: Vec::new(),
            omit_blocks: false,
        }
    }

    /// Sends the commit with an empty `blocks` field.
    pub fn without_blocks(mut self) -> Self {
        self.omit_blocks = true;
        self
    }

    /// Sets the stream sequence number.
    pub fn seq(mut self, seq: i64) -> Self {
        self.seq = seq;
        self
    }

    /// Adds a create of `record` at `path`, with its block.
    pub fn create(self, path: &str, record: &Value) -> Self {
        self.with_record(Action::Create, path, record)
    }

    /// Adds an update of `record` at `path`, with its block.
    pub fn update(self, path: &str, record: &Value) -> Self {
        self.with_record(Action::Update, path, record)
    }

    /// Adds a delete of `path`.
    pub fn delete(mut self, path: &str) -> Self {
        self.ops.push(PathOp::new(Action::Delete, path, None));
        self
    }

    /// Adds a create whose block is not in the archive.
    pub fn create_missing(mut self, path: &str, record: &Value) -> Self {
        let (cid, _) = record_block(record);
        self.ops.push(PathOp::new(Action::Create, path, Some(cid)));
        self
    }

    /// Adds a block under an arbitrary content hash.
    pub fn raw_block(mut self, cid: ContentHash, bytes: Vec<u8>) -> Self {
        self.blocks.push((cid, bytes));
        self
    }

    fn with_record(mut self, action: Action, path: &str, record: &Value) -> Self {
        let (cid, bytes) = record_block(record);
        self.ops.push(PathOp::new(action, path, Some(cid.clone())));
        self.blocks.push((cid, bytes));
        self
    }

    /// Content hash of the block backing the op at `index`.
    pub fn op_cid(&self, index: usize) -> Option<&ContentHash> {
        self.ops.get(index).and_then(|op| op.cid.as_ref())
    }

    /// The CAR archive: a signed-commit node as root, then the record blocks.
    pub fn archive(&self) -> Vec<u8> {
        if self.omit_blocks {
            return Vec::new();
        }
        let commit_node = Value::map(vec![
            (Value::from("did"), Value::from(self.repo.as_str())),
            (Value::from("rev"), Value::from(REV)),
            (Value::from("version"), Value::Integer(3)),
            (Value::from("sig"), Value::Bytes(vec![0; 64])),
        ]);
        let (root, node) = record_block(&commit_node);
        let mut blocks = vec![(root.clone(), node)];
        blocks.extend(self.blocks.iter().cloned());
        write_car(&[root], &blocks).expect("fixture archives encode")
    }

    /// The commit event.
    pub fn event(&self) -> CommitEvent {
        CommitEvent {
            seq: self.seq,
            repo: self.repo.clone(),
            rev: REV.to_string(),
            time: CREATED_AT.to_string(),
            too_big: false,
            ops: self.ops.clone(),
            blocks: self.archive(),
        }
    }

    /// The encoded firehose message.
    pub fn message(&self) -> Vec<u8> {
        FirehoseMessage::Commit(self.event())
            .encode()
            .expect("fixture messages encode")
    }
}

/// An encoded `#identity` message.
pub fn identity_message(seq: i64) -> Vec<u8> {
    FirehoseMessage::Other {
        kind: "#identity".to_string(),
        seq: Some(seq),
    }
    .encode()
    .expect("fixture messages encode")
}

/// An encoded relay error message.
pub fn error_message(error: &str) -> Vec<u8> {
    FirehoseMessage::Error {
        error: error.to_string(),
        message: None,
    }
    .encode()
    .expect("fixture messages encode")
}

/// A temporary directory of captured frames, one file per frame.
pub struct FrameDir {
    dir: TempDir,
    count: usize,
}

impl FrameDir {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            count: 0,
        }
    }

    /// Writes the next frame; files sort in insertion order.
    pub fn push(&mut self, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(format!("frame-{:06}.cbor", self.count));
        std::fs::write(&path, bytes).expect("Failed to write frame");
        self.count += 1;
        path
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for FrameDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arachne_protocol::{parse_message, CommitDecoder};

    #[test]
    fn built_commit_decodes() {
        let builder = CommitBuilder::new(TEST_DID)
            .seq(42)
            .create("app.bsky.feed.post/3k", &post_with_images("hi", &[(b"img", "image/png")]))
            .create("app.bsky.graph.follow/3f", &follow_record("did:plc:other"))
            .delete("app.bsky.feed.like/3l");

        let FirehoseMessage::Commit(event) = parse_message(&builder.message()).unwrap() else {
            panic!("expected a commit");
        };
        assert_eq!(event.seq, 42);
        let ops = CommitDecoder::decode(&event.into_frame().unwrap());
        assert_eq!(ops.posts_created.len(), 1);
        assert_eq!(ops.posts_created[0].record.images().len(), 1);
        assert_eq!(ops.follows_created.len(), 1);
        assert_eq!(ops.likes_deleted.len(), 1);
    }

    #[test]
    fn delete_only_commit_still_has_blocks() {
        let builder = CommitBuilder::new(TEST_DID).delete("app.bsky.feed.post/3k");
        assert!(!builder.event().blocks.is_empty());
        assert!(CommitBuilder::new(TEST_DID).without_blocks().event().blocks.is_empty());
    }

    #[test]
    fn frame_dir_sorts_in_order() {
        let mut dir = FrameDir::new();
        let a = dir.push(b"a");
        let b = dir.push(b"b");
        assert!(a < b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
