//! Firehose frame ingestion.

use crate::labeler::{LabelReport, Labeler};
use arachne_protocol::{parse_message, CommitDecoder, FirehoseMessage};
use tracing::{debug, trace, warn};

/// What one frame amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The bytes were not a firehose message.
    Malformed {
        /// Parse error.
        reason: String,
    },
    /// A message other than `#commit`.
    Ignored {
        /// Message kind (`#identity`, `#account`, ...).
        kind: String,
    },
    /// The relay sent an error message.
    RelayError {
        /// Error name.
        error: String,
    },
    /// A commit whose block archive could not be read.
    CorruptArchive {
        /// Stream sequence number.
        seq: i64,
        /// Archive error.
        reason: String,
    },
    /// A commit without blocks.
    Empty {
        /// Stream sequence number.
        seq: i64,
    },
    /// A commit that was decoded and labeled.
    Processed {
        /// Stream sequence number.
        seq: i64,
        /// Operations that survived decoding.
        ops: usize,
        /// Created posts handed to the labeler.
        posts: usize,
        /// Combined labeling results.
        report: LabelReport,
    },
}

impl IngestOutcome {
    /// Returns true if the frame was dropped because it could not be read.
    pub fn is_dropped(&self) -> bool {
        matches!(
            self,
            IngestOutcome::Malformed { .. } | IngestOutcome::CorruptArchive { .. }
        )
    }
}

/// Feeds firehose frames through decoding and labeling.
pub struct FrameIngestor {
    labeler: Labeler,
}

impl FrameIngestor {
    /// Creates an ingestor around a labeler.
    pub fn new(labeler: Labeler) -> Self {
        Self { labeler }
    }

    /// Returns the labeler.
    pub fn labeler(&self) -> &Labeler {
        &self.labeler
    }

    /// Processes one raw frame.
    ///
    /// Per-frame failures are logged and reported in the outcome; the caller
    /// keeps feeding frames either way.
    pub async fn ingest(&self, bytes: &[u8]) -> IngestOutcome {
        let commit = match parse_message(bytes) {
            Ok(FirehoseMessage::Commit(commit)) => commit,
            Ok(FirehoseMessage::Error { error, message }) => {
                warn!(error = %error, message = ?message, "relay reported an error");
                return IngestOutcome::RelayError { error };
            }
            Ok(FirehoseMessage::Other { kind, seq }) => {
                trace!(kind = %kind, seq = ?seq, "ignoring message");
                return IngestOutcome::Ignored { kind };
            }
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "dropping unparseable frame");
                return IngestOutcome::Malformed {
                    reason: e.to_string(),
                };
            }
        };

        let seq = commit.seq;
        if commit.blocks.is_empty() {
            debug!(seq, repo = %commit.repo, "commit without blocks");
            return IngestOutcome::Empty { seq };
        }

        let frame = match commit.into_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(seq, error = %e, "dropping frame with corrupt archive");
                return IngestOutcome::CorruptArchive {
                    seq,
                    reason: e.to_string(),
                };
            }
        };

        let ops = CommitDecoder::decode(&frame);
        let mut report = LabelReport::default();
        for post in &ops.posts_created {
            debug!(uri = %post.uri, langs = ?post.record.langs, "handling post");
            report.merge(self.labeler.label_post(post).await);
        }

        IngestOutcome::Processed {
            seq,
            ops: ops.len(),
            posts: ops.posts_created.len(),
            report,
        }
    }
}
