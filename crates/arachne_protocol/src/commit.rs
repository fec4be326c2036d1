//! Commit decoding: repository diffs into typed operations.

use crate::blocks::BlockStore;
use crate::record::{Follow, Like, Post, Record, RecordResolver, Repost, Resolution};
use crate::uri::{
    split_path, AtUri, FOLLOW_COLLECTION, LIKE_COLLECTION, POST_COLLECTION, REPOST_COLLECTION,
};
use arachne_codec::ContentHash;
use tracing::trace;

/// What a commit op did to its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A record was created.
    Create,
    /// A record was replaced.
    Update,
    /// A record was removed.
    Delete,
}

impl Action {
    /// Parses the wire name of an action.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// One operation of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOp {
    /// The action.
    pub action: Action,
    /// `<collection>/<rkey>`.
    pub path: String,
    /// New record version; absent for deletes.
    pub cid: Option<ContentHash>,
}

impl PathOp {
    /// Creates an op.
    pub fn new(action: Action, path: impl Into<String>, cid: Option<ContentHash>) -> Self {
        Self {
            action,
            path: path.into(),
            cid,
        }
    }
}

/// A commit with its blocks unpacked.
#[derive(Debug, Clone, Default)]
pub struct RepoDiffFrame {
    /// DID of the repository.
    pub repo_id: String,
    /// Blocks carried by the commit.
    pub blocks: BlockStore,
    /// Operations, in commit order.
    pub ops: Vec<PathOp>,
}

/// A newly created record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecord<T> {
    /// Record URI.
    pub uri: AtUri,
    /// Record version.
    pub cid: ContentHash,
    /// DID of the repository.
    pub author: String,
    /// Decoded record.
    pub record: T,
}

/// A removed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedRecord {
    /// Record URI.
    pub uri: AtUri,
}

/// Operations of a commit bucketed by collection and action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpsByType {
    /// Created posts.
    pub posts_created: Vec<CreatedRecord<Post>>,
    /// Deleted posts.
    pub posts_deleted: Vec<DeletedRecord>,
    /// Created reposts.
    pub reposts_created: Vec<CreatedRecord<Repost>>,
    /// Deleted reposts.
    pub reposts_deleted: Vec<DeletedRecord>,
    /// Created likes.
    pub likes_created: Vec<CreatedRecord<Like>>,
    /// Deleted likes.
    pub likes_deleted: Vec<DeletedRecord>,
    /// Created follows.
    pub follows_created: Vec<CreatedRecord<Follow>>,
    /// Deleted follows.
    pub follows_deleted: Vec<DeletedRecord>,
}

impl OpsByType {
    /// Total number of operations across all buckets.
    pub fn len(&self) -> usize {
        self.posts_created.len()
            + self.posts_deleted.len()
            + self.reposts_created.len()
            + self.reposts_deleted.len()
            + self.likes_created.len()
            + self.likes_deleted.len()
            + self.follows_created.len()
            + self.follows_deleted.len()
    }

    /// Returns true if every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns a [`RepoDiffFrame`] into [`OpsByType`].
///
/// Stateless: decoding the same frame twice yields equal results.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitDecoder;

impl CommitDecoder {
    /// Decodes every op of `frame`, in order.
    ///
    /// Ops that cannot be classified are dropped, never reported as errors:
    /// updates, creates without a resolvable record, creates whose path
    /// collection disagrees with the record type, and paths outside the four
    /// supported collections.
    pub fn decode(frame: &RepoDiffFrame) -> OpsByType {
        let mut ops = OpsByType::default();
        if frame.blocks.is_empty() {
            return ops;
        }

        let resolver = RecordResolver::new(&frame.blocks);
        for op in &frame.ops {
            match op.action {
                Action::Update => trace!(path = %op.path, "skipping update"),
                Action::Create => decode_create(&frame.repo_id, op, &resolver, &mut ops),
                Action::Delete => decode_delete(&frame.repo_id, op, &mut ops),
            }
        }
        ops
    }
}

fn decode_create(repo: &str, op: &PathOp, resolver: &RecordResolver<'_>, ops: &mut OpsByType) {
    let Some(cid) = &op.cid else {
        trace!(path = %op.path, "create without cid");
        return;
    };
    let record = match resolver.resolve(cid) {
        Resolution::Resolved(record) => record,
        Resolution::Unresolvable(reason) => {
            trace!(path = %op.path, %cid, %reason, "unresolvable record");
            return;
        }
    };
    let Ok(uri) = AtUri::from_path(repo, &op.path) else {
        trace!(path = %op.path, "malformed path");
        return;
    };
    if uri.collection() != record.type_tag() {
        trace!(path = %op.path, record_type = record.type_tag(), "collection mismatch");
        return;
    }

    let author = repo.to_string();
    let cid = cid.clone();
    match record {
        Record::Post(record) => ops.posts_created.push(CreatedRecord {
            uri,
            cid,
            author,
            record,
        }),
        Record::Repost(record) => ops.reposts_created.push(CreatedRecord {
            uri,
            cid,
            author,
            record,
        }),
        Record::Like(record) => ops.likes_created.push(CreatedRecord {
            uri,
            cid,
            author,
            record,
        }),
        Record::Follow(record) => ops.follows_created.push(CreatedRecord {
            uri,
            cid,
            author,
            record,
        }),
    }
}

fn decode_delete(repo: &str, op: &PathOp, ops: &mut OpsByType) {
    let Some((collection, _)) = split_path(&op.path) else {
        trace!(path = %op.path, "malformed path");
        return;
    };
    let bucket = match collection {
        POST_COLLECTION => &mut ops.posts_deleted,
        REPOST_COLLECTION => &mut ops.reposts_deleted,
        LIKE_COLLECTION => &mut ops.likes_deleted,
        FOLLOW_COLLECTION => &mut ops.follows_deleted,
        _ => {
            trace!(path = %op.path, "unsupported collection");
            return;
        }
    };
    if let Ok(uri) = AtUri::from_path(repo, &op.path) {
        bucket.push(DeletedRecord { uri });
    }
}
