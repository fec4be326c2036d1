//! # Arachne Labeler
//!
//! Firehose ingest and spider-image labeling.
//!
//! This crate provides:
//! - `FrameIngestor`, turning raw firehose frames into labeled posts
//! - `Labeler`, publishing post and image labels to two label logs
//! - `Moderator` and `HttpModerator` for the vision-model call
//! - `BlobFetcher` and `XrpcBlobFetcher` for image downloads
//!
//! ## Pipeline
//!
//! 1. Parse the message; anything other than `#commit` is ignored
//! 2. Read the block archive; a corrupt archive drops the frame
//! 3. Decode operations; only created posts continue
//! 4. For each supported image: fetch, classify, append two labels
//!
//! ## Key Invariants
//!
//! - A bad frame never stops ingestion
//! - A failed image never blocks the other images of the post
//! - Appended labels are never rolled back
//! - Collaborators are injected, never created globally

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod blob;
mod config;
mod error;
mod ingest;
mod labeler;
mod moderation;

pub use blob::{BlobFetcher, XrpcBlobFetcher, GET_BLOB_METHOD};
pub use config::{
    LabelerConfig, DEFAULT_BLOB_SERVICE_URL, DEFAULT_MODERATION_API_URL, DEFAULT_MODERATION_MODEL,
};
pub use error::{LabelerError, LabelerResult};
pub use ingest::{FrameIngestor, IngestOutcome};
pub use labeler::{LabelReport, Labeler};
pub use moderation::{
    is_supported_media_type, normalize_verdict, HttpModerator, Moderator, SUPPORTED_MEDIA_TYPES,
    SYSTEM_PROMPT, USER_PROMPT,
};
