//! # Arachne Protocol
//!
//! Firehose commit decoding and label wire types.
//!
//! This crate provides:
//! - `parse_message` for the two-item firehose envelope
//! - CAR archive reading and writing (`read_car`, `CarWriter`)
//! - `RecordResolver` and the typed `Record` shapes
//! - `CommitDecoder`, turning a commit into `OpsByType`
//! - `Label`, `LabelsFrame` and `ErrorFrame` for the label stream
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blocks;
mod car;
mod commit;
mod error;
mod label;
mod message;
mod record;
mod uri;

pub use blocks::{BlockStore, PutOutcome};
pub use car::{read_car, write_car, CarWriter};
pub use commit::{
    Action, CommitDecoder, CreatedRecord, DeletedRecord, OpsByType, PathOp, RepoDiffFrame,
};
pub use error::{ProtocolError, ProtocolResult};
pub use label::{ErrorFrame, Label, LabelsFrame};
pub use message::{parse_message, CommitEvent, FirehoseMessage};
pub use record::{
    AspectRatio, BlobRef, Embed, Follow, Image, Like, Post, Record, RecordResolver, Repost,
    Resolution, StrongRef, Unresolvable, IMAGES_EMBED, RECORD_WITH_MEDIA_EMBED,
};
pub use uri::{
    split_path, AtUri, FOLLOW_COLLECTION, LIKE_COLLECTION, POST_COLLECTION, REPOST_COLLECTION,
};
