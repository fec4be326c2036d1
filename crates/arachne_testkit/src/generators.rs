//! Property-based test generators using proptest.
//!
//! Strategies produce well-formed identifiers, records and whole commits,
//! plus mutations of encoded frames for robustness tests.

use crate::fixtures::{follow_record, like_record, post_record, post_with_images, CommitBuilder};
use arachne_codec::{ContentHash, Value};
use arachne_protocol::{Label, FOLLOW_COLLECTION, LIKE_COLLECTION, POST_COLLECTION};
use proptest::prelude::*;

/// Strategy for `did:plc:` identifiers.
pub fn did_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("did:plc:[a-z2-7]{24}").expect("Invalid regex")
}

/// Strategy for record keys (TID-shaped).
pub fn rkey_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("3[a-z2-7]{12}").expect("Invalid regex")
}

/// Strategy for arbitrary content hashes of DAG-CBOR blocks.
pub fn content_hash_strategy() -> impl Strategy<Value = ContentHash> {
    prop::collection::vec(any::<u8>(), 0..64).prop_map(|bytes| ContentHash::for_dag_cbor(&bytes))
}

/// Strategy for media types, a few of them unsupported by moderation.
pub fn mime_type_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/heic",
        "image/svg+xml",
    ])
}

/// Strategy for post records with zero to four images.
pub fn post_strategy() -> impl Strategy<Value = Value> {
    (
        "[ -~]{0,64}",
        prop::collection::vec((prop::collection::vec(any::<u8>(), 1..32), mime_type_strategy()), 0..4),
    )
        .prop_map(|(text, images)| {
            if images.is_empty() {
                return post_record(&text);
            }
            let refs: Vec<(&[u8], &str)> = images.iter().map(|(b, m)| (b.as_slice(), *m)).collect();
            post_with_images(&text, &refs)
        })
}

/// One operation of a generated commit.
#[derive(Debug, Clone)]
pub enum GeneratedOp {
    /// Create a record in a collection.
    Create {
        /// Collection NSID.
        collection: &'static str,
        /// Record key.
        rkey: String,
        /// Record body.
        record: Value,
    },
    /// Update a post.
    Update {
        /// Record key.
        rkey: String,
    },
    /// Delete a record in a collection.
    Delete {
        /// Collection NSID.
        collection: &'static str,
        /// Record key.
        rkey: String,
    },
}

fn op_strategy() -> impl Strategy<Value = GeneratedOp> {
    let collection = prop::sample::select(vec![POST_COLLECTION, LIKE_COLLECTION, FOLLOW_COLLECTION]);
    prop_oneof![
        (post_strategy(), rkey_strategy()).prop_map(|(record, rkey)| GeneratedOp::Create {
            collection: POST_COLLECTION,
            rkey,
            record,
        }),
        (content_hash_strategy(), rkey_strategy()).prop_map(|(cid, rkey)| GeneratedOp::Create {
            collection: LIKE_COLLECTION,
            rkey,
            record: like_record("at://did:plc:x/app.bsky.feed.post/3k", &cid),
        }),
        (did_strategy(), rkey_strategy()).prop_map(|(did, rkey)| GeneratedOp::Create {
            collection: FOLLOW_COLLECTION,
            rkey,
            record: follow_record(&did),
        }),
        rkey_strategy().prop_map(|rkey| GeneratedOp::Update { rkey }),
        (collection, rkey_strategy()).prop_map(|(collection, rkey)| GeneratedOp::Delete { collection, rkey }),
    ]
}

/// Strategy for a commit's repository and its operations.
pub fn commit_strategy() -> impl Strategy<Value = (String, Vec<GeneratedOp>)> {
    (did_strategy(), prop::collection::vec(op_strategy(), 0..12))
}

/// Builds the commit described by generated operations.
pub fn build_commit(repo: &str, ops: &[GeneratedOp]) -> CommitBuilder {
    ops.iter().fold(CommitBuilder::new(repo), |builder, op| match op {
        GeneratedOp::Create {
            collection,
            rkey,
            record,
        } => builder.create(&format!("{collection}/{rkey}"), record),
        GeneratedOp::Update { rkey } => {
            builder.update(&format!("{POST_COLLECTION}/{rkey}"), &post_record("edited"))
        }
        GeneratedOp::Delete { collection, rkey } => builder.delete(&format!("{collection}/{rkey}")),
    })
}

/// Strategy for labels.
pub fn label_strategy() -> impl Strategy<Value = Label> {
    (
        did_strategy(),
        rkey_strategy(),
        prop::option::of(content_hash_strategy()),
        prop::sample::select(vec!["Yes", "No", "Maybe"]),
    )
        .prop_map(|(did, rkey, cid, val)| {
            Label::new(
                did.as_str(),
                format!("at://{did}/{POST_COLLECTION}/{rkey}"),
                cid,
                val,
                "2024-03-18T23:02:46.310Z",
            )
        })
}

/// Strategy that corrupts an encoded frame by flipping, truncating or extending it.
pub fn mutated_bytes(bytes: Vec<u8>) -> impl Strategy<Value = Vec<u8>> {
    let len = bytes.len().max(1);
    (0..len, any::<u8>(), 0..3u8).prop_map(move |(at, byte, mode)| {
        let mut out = bytes.clone();
        match mode {
            0 if at < out.len() => out[at] ^= byte | 1,
            1 => out.truncate(at),
            _ => out.push(byte),
        }
        out
    })
}
