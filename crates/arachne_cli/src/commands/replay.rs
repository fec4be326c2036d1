//! Replay command implementation.

use super::decode::{decode_frame, Buckets, FrameInfo};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Per-bucket operation counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    /// Created posts.
    pub posts_created: usize,
    /// Deleted posts.
    pub posts_deleted: usize,
    /// Created reposts.
    pub reposts_created: usize,
    /// Deleted reposts.
    pub reposts_deleted: usize,
    /// Created likes.
    pub likes_created: usize,
    /// Deleted likes.
    pub likes_deleted: usize,
    /// Created follows.
    pub follows_created: usize,
    /// Deleted follows.
    pub follows_deleted: usize,
}

impl From<&Buckets> for BucketCounts {
    fn from(b: &Buckets) -> Self {
        Self {
            posts_created: b.posts_created.len(),
            posts_deleted: b.posts_deleted.len(),
            reposts_created: b.reposts_created.len(),
            reposts_deleted: b.reposts_deleted.len(),
            likes_created: b.likes_created.len(),
            likes_deleted: b.likes_deleted.len(),
            follows_created: b.follows_created.len(),
            follows_deleted: b.follows_deleted.len(),
        }
    }
}

/// How one captured frame decoded.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameStatus {
    /// A decoded commit.
    Commit {
        /// Stream sequence number.
        seq: i64,
        /// Bucket sizes.
        counts: BucketCounts,
    },
    /// A message that is not a commit.
    Skipped {
        /// What the message was.
        kind: String,
    },
    /// A frame that could not be decoded.
    Corrupt {
        /// Why.
        reason: String,
    },
}

/// One line of replay output.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    /// File name of the frame.
    pub file: String,
    /// Result.
    #[serde(flatten)]
    pub status: FrameStatus,
}

/// Totals across a directory.
#[derive(Debug, Default, Serialize)]
pub struct ReplaySummary {
    /// Per-frame results, in file order.
    pub frames: Vec<FrameReport>,
    /// Commits decoded.
    pub commits: usize,
    /// Frames that failed to decode.
    pub corrupt: usize,
    /// Non-commit messages.
    pub skipped: usize,
}

/// Lists the regular files of `dir`, sorted by name.
pub fn frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Decodes every frame in `dir`.
pub fn replay_dir(dir: &Path) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for path in frame_files(dir)? {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

        let status = match decode_frame(&bytes) {
            Ok(FrameInfo::Commit { seq, ops, .. }) => {
                summary.commits += 1;
                FrameStatus::Commit {
                    seq,
                    counts: BucketCounts::from(&ops),
                }
            }
            Ok(FrameInfo::Error { error, .. }) => {
                summary.skipped += 1;
                FrameStatus::Skipped {
                    kind: format!("error {error}"),
                }
            }
            Ok(FrameInfo::Other { kind, .. }) => {
                summary.skipped += 1;
                FrameStatus::Skipped { kind }
            }
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "corrupt frame");
                summary.corrupt += 1;
                FrameStatus::Corrupt {
                    reason: format!("{e:#}"),
                }
            }
        };
        summary.frames.push(FrameReport { file, status });
    }

    Ok(summary)
}

/// Runs the replay command.
pub fn run(dir: &Path, format: &str) -> Result<()> {
    let summary = replay_dir(dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text_output(&summary);
        }
    }

    Ok(())
}

fn print_text_output(summary: &ReplaySummary) {
    println!(
        "Frames ({} total, {} commits, {} skipped, {} corrupt)",
        summary.frames.len(),
        summary.commits,
        summary.skipped,
        summary.corrupt
    );
    println!("================");

    for frame in &summary.frames {
        match &frame.status {
            FrameStatus::Commit { seq, counts } => println!(
                "{:24} seq={seq} posts=+{}/-{} reposts=+{}/-{} likes=+{}/-{} follows=+{}/-{}",
                frame.file,
                counts.posts_created,
                counts.posts_deleted,
                counts.reposts_created,
                counts.reposts_deleted,
                counts.likes_created,
                counts.likes_deleted,
                counts.follows_created,
                counts.follows_deleted,
            ),
            FrameStatus::Skipped { kind } => println!("{:24} skipped {kind}", frame.file),
            FrameStatus::Corrupt { reason } => println!("{:24} CORRUPT {reason}", frame.file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arachne_testkit::prelude::*;

    #[test]
    fn replays_in_name_order() {
        let mut dir = FrameDir::new();
        dir.push(
            &CommitBuilder::new(TEST_DID)
                .seq(1)
                .create("app.bsky.feed.post/3a", &post_record("one"))
                .create("app.bsky.graph.follow/3b", &follow_record("did:plc:other"))
                .message(),
        );
        dir.push(&identity_message(2));
        dir.push(b"\xff\xff not cbor");
        dir.push(
            &CommitBuilder::new(TEST_DID)
                .seq(4)
                .delete("app.bsky.feed.post/3a")
                .message(),
        );

        let summary = replay_dir(dir.path()).unwrap();
        assert_eq!(summary.frames.len(), 4);
        assert_eq!((summary.commits, summary.skipped, summary.corrupt), (2, 1, 1));

        let FrameStatus::Commit { seq, counts } = &summary.frames[0].status else {
            panic!("expected a commit");
        };
        assert_eq!(*seq, 1);
        assert_eq!(counts.posts_created, 1);
        assert_eq!(counts.follows_created, 1);
        assert!(matches!(summary.frames[2].status, FrameStatus::Corrupt { .. }));
        assert!(matches!(
            summary.frames[3].status,
            FrameStatus::Commit { seq: 4, counts: BucketCounts { posts_deleted: 1, .. } }
        ));
    }

    #[test]
    fn skips_subdirectories() {
        let mut dir = FrameDir::new();
        dir.push(&identity_message(1));
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        assert_eq!(frame_files(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn json_summary_flattens_status() {
        let mut dir = FrameDir::new();
        dir.push(&identity_message(1));
        let json = serde_json::to_value(replay_dir(dir.path()).unwrap()).unwrap();
        assert_eq!(json["frames"][0]["status"], "skipped");
        assert_eq!(json["frames"][0]["file"], "frame-000000.cbor");
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(replay_dir(&dir.path().join("absent")).is_err());
    }
}
