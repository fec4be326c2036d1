//! Decode command implementation.

use anyhow::{Context, Result};
use arachne_protocol::{
    parse_message, CommitDecoder, CreatedRecord, DeletedRecord, Follow, FirehoseMessage, Like,
    OpsByType, Post, Repost,
};
use serde::Serialize;
use std::path::Path;

/// A created record, summarized for output.
#[derive(Debug, Serialize)]
pub struct CreatedInfo {
    /// Record URI.
    pub uri: String,
    /// Record content hash.
    pub cid: String,
    /// Repository DID.
    pub author: String,
    /// Post text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Post images as `cid (mime type)`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Subject of a like, repost or follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl CreatedInfo {
    fn new<T>(created: &CreatedRecord<T>) -> Self {
        Self {
            uri: created.uri.to_string(),
            cid: created.cid.to_string(),
            author: created.author.clone(),
            text: None,
            images: Vec::new(),
            subject: None,
        }
    }

    fn post(created: &CreatedRecord<Post>) -> Self {
        Self {
            text: Some(created.record.text.clone()),
            images: created
                .record
                .images()
                .iter()
                .map(|image| format!("{} ({})", image.blob.content_hash, image.blob.mime_type))
                .collect(),
            ..Self::new(created)
        }
    }

    fn repost(created: &CreatedRecord<Repost>) -> Self {
        Self {
            subject: Some(created.record.subject.uri.clone()),
            ..Self::new(created)
        }
    }

    fn like(created: &CreatedRecord<Like>) -> Self {
        Self {
            subject: Some(created.record.subject.uri.clone()),
            ..Self::new(created)
        }
    }

    fn follow(created: &CreatedRecord<Follow>) -> Self {
        Self {
            subject: Some(created.record.subject.clone()),
            ..Self::new(created)
        }
    }
}

/// The eight operation buckets of a commit.
#[derive(Debug, Default, Serialize)]
pub struct Buckets {
    /// Created posts.
    pub posts_created: Vec<CreatedInfo>,
    /// Deleted post URIs.
    pub posts_deleted: Vec<String>,
    /// Created reposts.
    pub reposts_created: Vec<CreatedInfo>,
    /// Deleted repost URIs.
    pub reposts_deleted: Vec<String>,
    /// Created likes.
    pub likes_created: Vec<CreatedInfo>,
    /// Deleted like URIs.
    pub likes_deleted: Vec<String>,
    /// Created follows.
    pub follows_created: Vec<CreatedInfo>,
    /// Deleted follow URIs.
    pub follows_deleted: Vec<String>,
}

fn deleted(records: &[DeletedRecord]) -> Vec<String> {
    records.iter().map(|d| d.uri.to_string()).collect()
}

impl From<&OpsByType> for Buckets {
    fn from(ops: &OpsByType) -> Self {
        Self {
            posts_created: ops.posts_created.iter().map(CreatedInfo::post).collect(),
            posts_deleted: deleted(&ops.posts_deleted),
            reposts_created: ops.reposts_created.iter().map(CreatedInfo::repost).collect(),
            reposts_deleted: deleted(&ops.reposts_deleted),
            likes_created: ops.likes_created.iter().map(CreatedInfo::like).collect(),
            likes_deleted: deleted(&ops.likes_deleted),
            follows_created: ops.follows_created.iter().map(CreatedInfo::follow).collect(),
            follows_deleted: deleted(&ops.follows_deleted),
        }
    }
}

/// A decoded firehose message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameInfo {
    /// A commit with its buckets.
    Commit {
        /// Stream sequence number.
        seq: i64,
        /// Repository DID.
        repo: String,
        /// Decoded operations.
        ops: Buckets,
    },
    /// A relay error.
    Error {
        /// Error name.
        error: String,
        /// Description.
        message: Option<String>,
    },
    /// Any other message kind.
    Other {
        /// Message kind.
        kind: String,
        /// Sequence number.
        seq: Option<i64>,
    },
}

/// Decodes one captured message.
///
/// A commit without blocks decodes to empty buckets.
pub fn decode_frame(bytes: &[u8]) -> Result<FrameInfo> {
    let message = parse_message(bytes).context("Failed to parse firehose message")?;
    Ok(match message {
        FirehoseMessage::Commit(commit) => {
            let seq = commit.seq;
            let repo = commit.repo.clone();
            let ops = if commit.blocks.is_empty() {
                Buckets::default()
            } else {
                let frame = commit
                    .into_frame()
                    .with_context(|| format!("Commit {seq} has a corrupt block archive"))?;
                Buckets::from(&CommitDecoder::decode(&frame))
            };
            FrameInfo::Commit { seq, repo, ops }
        }
        FirehoseMessage::Error { error, message } => FrameInfo::Error { error, message },
        FirehoseMessage::Other { kind, seq } => FrameInfo::Other { kind, seq },
    })
}

/// Runs the decode command.
pub fn run(path: &Path, format: &str) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let info = decode_frame(&bytes)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        _ => {
            print_text_output(&info);
        }
    }

    Ok(())
}

fn print_created(name: &str, records: &[CreatedInfo]) {
    println!("{name} ({})", records.len());
    for record in records {
        print!("  {} cid={}", record.uri, record.cid);
        if let Some(ref subject) = record.subject {
            print!(" subject={subject}");
        }
        if let Some(ref text) = record.text {
            print!(" text={text:?}");
        }
        println!();
        for image in &record.images {
            println!("    image {image}");
        }
    }
}

fn print_deleted(name: &str, uris: &[String]) {
    println!("{name} ({})", uris.len());
    for uri in uris {
        println!("  {uri}");
    }
}

fn print_text_output(info: &FrameInfo) {
    match info {
        FrameInfo::Commit { seq, repo, ops } => {
            println!("Commit seq={seq} repo={repo}");
            println!("================");
            print_created("posts created", &ops.posts_created);
            print_deleted("posts deleted", &ops.posts_deleted);
            print_created("reposts created", &ops.reposts_created);
            print_deleted("reposts deleted", &ops.reposts_deleted);
            print_created("likes created", &ops.likes_created);
            print_deleted("likes deleted", &ops.likes_deleted);
            print_created("follows created", &ops.follows_created);
            print_deleted("follows deleted", &ops.follows_deleted);
        }
        FrameInfo::Error { error, message } => {
            println!("Relay error {error}: {}", message.as_deref().unwrap_or("-"));
        }
        FrameInfo::Other { kind, seq } => match seq {
            Some(seq) => println!("{kind} seq={seq} (not a commit)"),
            None => println!("{kind} (not a commit)"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arachne_codec::ContentHash;
    use arachne_testkit::prelude::*;

    #[test]
    fn decodes_all_buckets() {
        let subject = ContentHash::for_dag_cbor(b"subject");
        let bytes = CommitBuilder::new(TEST_DID)
            .seq(5)
            .create(
                "app.bsky.feed.post/3a",
                &post_with_images("look", &[(b"img", "image/jpeg")]),
            )
            .create("app.bsky.feed.like/3b", &like_record("at://did:plc:x/app.bsky.feed.post/3z", &subject))
            .create("app.bsky.feed.repost/3c", &repost_record("at://did:plc:x/app.bsky.feed.post/3z", &subject))
            .create("app.bsky.graph.follow/3d", &follow_record("did:plc:other"))
            .delete("app.bsky.feed.post/3e")
            .message();

        let FrameInfo::Commit { seq, repo, ops } = decode_frame(&bytes).unwrap() else {
            panic!("expected a commit");
        };
        assert_eq!(seq, 5);
        assert_eq!(repo, TEST_DID);
        assert_eq!(ops.posts_created.len(), 1);
        assert_eq!(ops.posts_created[0].images.len(), 1);
        assert!(ops.posts_created[0].images[0].ends_with("(image/jpeg)"));
        assert_eq!(ops.likes_created[0].subject.as_deref(), Some("at://did:plc:x/app.bsky.feed.post/3z"));
        assert_eq!(ops.reposts_created.len(), 1);
        assert_eq!(ops.follows_created[0].subject.as_deref(), Some("did:plc:other"));
        assert_eq!(ops.posts_deleted, vec![format!("at://{TEST_DID}/app.bsky.feed.post/3e")]);
    }

    #[test]
    fn json_output_is_tagged() {
        let info = decode_frame(&identity_message(12)).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "other");
        assert_eq!(json["kind"], "#identity");
        assert_eq!(json["seq"], 12);
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let mut event = CommitBuilder::new(TEST_DID)
            .create("app.bsky.feed.post/3a", &post_record("x"))
            .event();
        event.blocks.truncate(4);
        let bytes = FirehoseMessage::Commit(event).encode().unwrap();

        let err = decode_frame(&bytes).unwrap_err();
        assert!(err.to_string().contains("corrupt block archive"));
    }

    #[test]
    fn run_reads_file() {
        let mut dir = FrameDir::new();
        let path = dir.push(&CommitBuilder::new(TEST_DID).delete("app.bsky.feed.post/3a").message());
        assert!(run(&path, "json").is_ok());
        assert!(run(&dir.path().join("missing"), "text").is_err());
    }
}
